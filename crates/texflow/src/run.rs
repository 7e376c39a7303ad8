//! Resolves the CLI input into a run plan (scenario file or built-in demo),
//! drives the engine for the requested number of ticks, and reports the
//! final state of every variable.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use compute::{ComputeEngine, GpuContext};
use scenario::{Scenario, SeedSpec};
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Demo};

pub fn initialise_tracing() {
    let default_filter =
        "warn,texflow=info,compute=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

struct Plan {
    width: u32,
    height: u32,
    ticks: u32,
    variables: Vec<PlanVariable>,
}

struct PlanVariable {
    name: String,
    program: String,
    depends: Vec<String>,
    seed: SeedSpec,
    params: Option<[f32; 4]>,
}

pub fn run(args: Args) -> Result<()> {
    let mut plan = match (&args.scenario, args.demo) {
        (Some(path), None) => {
            let scenario = Scenario::load(path)
                .with_context(|| format!("failed to load scenario {}", path.display()))?;
            plan_from_scenario(scenario)?
        }
        (None, Some(demo)) => plan_demo(demo),
        (None, None) => bail!("nothing to run; pass a scenario file or --demo (see --help)"),
        (Some(_), Some(_)) => unreachable!("clap rejects scenario together with --demo"),
    };

    if let Some((width, height)) = args.size {
        plan.width = width;
        plan.height = height;
    }
    if let Some(ticks) = args.ticks {
        plan.ticks = ticks;
    }

    execute(plan, args.dump)
}

fn plan_from_scenario(scenario: Scenario) -> Result<Plan> {
    let variables = scenario
        .variables
        .into_iter()
        .map(|spec| {
            let program = std::fs::read_to_string(&spec.program).with_context(|| {
                format!(
                    "failed to read program {} for variable `{}`",
                    spec.program.display(),
                    spec.name
                )
            })?;
            Ok(PlanVariable {
                name: spec.name,
                program,
                depends: spec.depends,
                seed: spec.seed,
                params: spec.params,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Plan {
        width: scenario.size.width,
        height: scenario.size.height,
        ticks: scenario.ticks,
        variables,
    })
}

const COUNTER_PROGRAM: &str = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(frag_coord.xy);
    return textureLoad(counter, texel, 0) + vec4<f32>(1.0, 0.0, 0.0, 0.0);
}
"#;

const POSITION_PROGRAM: &str = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(frag_coord.xy);
    let pos = textureLoad(position, texel, 0);
    let vel = textureLoad(velocity, texel, 0);
    return pos + vel * params.x;
}
"#;

const VELOCITY_PROGRAM: &str = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(velocity, vec2<i32>(frag_coord.xy), 0);
}
"#;

fn plan_demo(demo: Demo) -> Plan {
    match demo {
        Demo::Counter => Plan {
            width: 64,
            height: 64,
            ticks: 10,
            variables: vec![PlanVariable {
                name: "counter".to_owned(),
                program: COUNTER_PROGRAM.to_owned(),
                depends: vec!["counter".to_owned()],
                seed: SeedSpec::Zero,
                params: None,
            }],
        },
        Demo::Advect => Plan {
            width: 64,
            height: 64,
            ticks: 60,
            variables: vec![
                PlanVariable {
                    name: "position".to_owned(),
                    program: POSITION_PROGRAM.to_owned(),
                    depends: vec!["position".to_owned(), "velocity".to_owned()],
                    seed: SeedSpec::Zero,
                    // params.x is the integration step
                    params: Some([1.0 / 60.0, 0.0, 0.0, 0.0]),
                },
                PlanVariable {
                    name: "velocity".to_owned(),
                    program: VELOCITY_PROGRAM.to_owned(),
                    depends: vec!["velocity".to_owned()],
                    seed: SeedSpec::Random {
                        min: -1.0,
                        max: 1.0,
                        seed: 7,
                    },
                    params: None,
                },
            ],
        },
    }
}

fn execute(plan: Plan, dump: bool) -> Result<()> {
    let gpu = GpuContext::headless()?;
    let mut engine = ComputeEngine::new(gpu, plan.width, plan.height);

    let mut handles = Vec::with_capacity(plan.variables.len());
    for variable in &plan.variables {
        let seed = variable.seed.build(plan.width, plan.height);
        let handle = engine
            .add_variable(&variable.name, &variable.program, &seed)
            .with_context(|| format!("failed to register variable `{}`", variable.name))?;
        handles.push(handle);
    }
    for (variable, handle) in plan.variables.iter().zip(&handles) {
        let depends: Vec<&str> = variable.depends.iter().map(String::as_str).collect();
        engine
            .set_dependencies(*handle, &depends)
            .with_context(|| format!("failed to wire variable `{}`", variable.name))?;
        if let Some(params) = variable.params {
            engine.set_params(*handle, params);
        }
    }
    engine.init().context("engine initialisation failed")?;

    let started = Instant::now();
    for _ in 0..plan.ticks {
        engine.compute();
    }
    let texel_count = u64::from(plan.width) * u64::from(plan.height);
    tracing::info!(
        ticks = plan.ticks,
        width = plan.width,
        height = plan.height,
        elapsed = ?started.elapsed(),
        "run complete"
    );

    for (variable, handle) in plan.variables.iter().zip(&handles) {
        let texels = engine
            .read_current(*handle)
            .with_context(|| format!("failed to read back variable `{}`", variable.name))?;
        report(&variable.name, texel_count, &texels);
        if dump {
            dump_texels(&variable.name, plan.width, &texels);
        }
    }
    Ok(())
}

fn report(name: &str, texel_count: u64, texels: &[f32]) {
    let mut min = [f32::INFINITY; 4];
    let mut max = [f32::NEG_INFINITY; 4];
    let mut sum = [0.0f64; 4];
    for texel in texels.chunks_exact(4) {
        for channel in 0..4 {
            min[channel] = min[channel].min(texel[channel]);
            max[channel] = max[channel].max(texel[channel]);
            sum[channel] += f64::from(texel[channel]);
        }
    }
    let mean: Vec<f64> = sum.iter().map(|total| total / texel_count as f64).collect();
    tracing::info!(variable = %name, ?min, ?max, ?mean, "final state");
}

fn dump_texels(name: &str, width: u32, texels: &[f32]) {
    println!("# {name}");
    for (index, texel) in texels.chunks_exact(4).enumerate() {
        let x = index as u32 % width;
        let y = index as u32 / width;
        println!(
            "{x:4} {y:4}  {:12.6} {:12.6} {:12.6} {:12.6}",
            texel[0], texel[1], texel[2], texel[3]
        );
    }
}
