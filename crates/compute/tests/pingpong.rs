//! End-to-end engine behavior against a real adapter. Every test bails out
//! quietly when the machine has no usable GPU so headless CI stays green.

use compute::{
    ComputeEngine, ComputeError, FilterPass, GpuContext, SamplingConfig, TexelKind, WrapMode,
};

const GRID: u32 = 4;

fn engine(width: u32, height: u32) -> Option<ComputeEngine> {
    let gpu = match GpuContext::headless() {
        Ok(gpu) => gpu,
        Err(err) => {
            eprintln!("skipping: no GPU adapter available ({err:#})");
            return None;
        }
    };
    if !gpu.capabilities().supports_target(TexelKind::F32) {
        eprintln!("skipping: adapter cannot render into f32 targets");
        return None;
    }
    Some(ComputeEngine::new(gpu, width, height))
}

const COUNTER_PROGRAM: &str = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(frag_coord.xy);
    return textureLoad(counter, texel, 0) + vec4<f32>(1.0, 0.0, 0.0, 0.0);
}
"#;

const IDENTITY_VELOCITY: &str = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(velocity, vec2<i32>(frag_coord.xy), 0);
}
"#;

const INTEGRATE_POSITION: &str = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(frag_coord.xy);
    let pos = textureLoad(position, texel, 0);
    let vel = textureLoad(velocity, texel, 0);
    return pos + vel;
}
"#;

fn assert_all_texels(texels: &[f32], expected: [f32; 4]) {
    for (index, chunk) in texels.chunks_exact(4).enumerate() {
        assert_eq!(chunk, expected, "texel {index} diverged");
    }
}

#[test]
fn seeding_fills_both_targets() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let mut seed = engine.create_state();
    seed.fill([7.0, 8.0, 9.0, 1.0]);
    let counter = engine
        .add_variable("counter", COUNTER_PROGRAM, &seed)
        .expect("register");
    engine.set_dependencies(counter, &["counter"]).expect("wire");
    engine.init().expect("init");

    let current = engine.read_current(counter).expect("readback");
    assert_all_texels(&current, [7.0, 8.0, 9.0, 1.0]);
    let alternate = engine
        .alternate_target(counter)
        .read_texels(engine.gpu())
        .expect("readback");
    assert_all_texels(&alternate, [7.0, 8.0, 9.0, 1.0]);
}

#[test]
fn self_dependent_counter_accumulates() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let seed = engine.create_state();
    let counter = engine
        .add_variable("counter", COUNTER_PROGRAM, &seed)
        .expect("register");
    engine.set_dependencies(counter, &["counter"]).expect("wire");
    engine.init().expect("init");

    for _ in 0..5 {
        engine.compute();
    }
    let texels = engine.read_current(counter).expect("readback");
    assert_all_texels(&texels, [5.0, 0.0, 0.0, 0.0]);
}

#[test]
fn position_integrates_velocity() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let position_seed = engine.create_state();
    let mut velocity_seed = engine.create_state();
    velocity_seed.fill([1.0, 0.0, 0.0, 0.0]);

    let position = engine
        .add_variable("position", INTEGRATE_POSITION, &position_seed)
        .expect("register position");
    let velocity = engine
        .add_variable("velocity", IDENTITY_VELOCITY, &velocity_seed)
        .expect("register velocity");
    engine
        .set_dependencies(position, &["position", "velocity"])
        .expect("wire position");
    engine
        .set_dependencies(velocity, &["velocity"])
        .expect("wire velocity");
    engine.init().expect("init");

    for _ in 0..3 {
        engine.compute();
    }
    let positions = engine.read_current(position).expect("readback");
    assert_all_texels(&positions, [3.0, 0.0, 0.0, 0.0]);
    let velocities = engine.read_current(velocity).expect("readback");
    assert_all_texels(&velocities, [1.0, 0.0, 0.0, 0.0]);
}

#[test]
fn buffer_index_flips_once_per_tick() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let seed = engine.create_state();
    let counter = engine
        .add_variable("counter", COUNTER_PROGRAM, &seed)
        .expect("register");
    engine.set_dependencies(counter, &["counter"]).expect("wire");
    engine.init().expect("init");

    assert_eq!(engine.current_index(), 0);
    engine.compute();
    assert_eq!(engine.current_index(), 1);
    engine.compute();
    assert_eq!(engine.current_index(), 0);
}

#[test]
fn mutually_dependent_variables_swap_atomically() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let mut left_seed = engine.create_state();
    left_seed.fill([1.0, 0.0, 0.0, 0.0]);
    let mut right_seed = engine.create_state();
    right_seed.fill([2.0, 0.0, 0.0, 0.0]);

    let take_right = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(right, vec2<i32>(frag_coord.xy), 0);
}
"#;
    let take_left = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(left, vec2<i32>(frag_coord.xy), 0);
}
"#;

    let left = engine
        .add_variable("left", take_right, &left_seed)
        .expect("register left");
    let right = engine
        .add_variable("right", take_left, &right_seed)
        .expect("register right");
    engine.set_dependencies(left, &["right"]).expect("wire left");
    engine.set_dependencies(right, &["left"]).expect("wire right");
    engine.init().expect("init");

    // Both programs read the same pre-tick snapshot, so the values trade
    // places instead of collapsing to one side.
    engine.compute();
    assert_all_texels(&engine.read_current(left).expect("readback"), [2.0, 0.0, 0.0, 0.0]);
    assert_all_texels(&engine.read_current(right).expect("readback"), [1.0, 0.0, 0.0, 0.0]);

    engine.compute();
    assert_all_texels(&engine.read_current(left).expect("readback"), [1.0, 0.0, 0.0, 0.0]);
    assert_all_texels(&engine.read_current(right).expect("readback"), [2.0, 0.0, 0.0, 0.0]);
}

#[test]
fn params_reach_the_program() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let emit_params = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    return params;
}
"#;
    let seed = engine.create_state();
    let probe = engine
        .add_variable("probe", emit_params, &seed)
        .expect("register");
    engine.init().expect("init");

    engine.set_params(probe, [0.5, -1.0, 3.0, 4.0]);
    engine.compute();
    let texels = engine.read_current(probe).expect("readback");
    assert_all_texels(&texels, [0.5, -1.0, 3.0, 4.0]);
}

#[test]
fn unknown_dependency_is_reported_before_first_tick() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let seed = engine.create_state();
    let counter = engine
        .add_variable("counter", COUNTER_PROGRAM, &seed)
        .expect("register");
    engine
        .set_dependencies(counter, &["counter", "missing"])
        .expect("wire");

    match engine.init() {
        Err(ComputeError::UnknownDependency {
            variable,
            dependency,
        }) => {
            assert_eq!(variable, "counter");
            assert_eq!(dependency, "missing");
        }
        other => panic!("expected UnknownDependency, got {other:?}"),
    }
}

#[test]
fn structural_mutation_after_init_is_rejected() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let seed = engine.create_state();
    let counter = engine
        .add_variable("counter", COUNTER_PROGRAM, &seed)
        .expect("register");
    engine.set_dependencies(counter, &["counter"]).expect("wire");
    engine.init().expect("init");

    assert!(matches!(
        engine.init(),
        Err(ComputeError::AlreadyInitialized)
    ));
    assert!(matches!(
        engine.add_variable("late", COUNTER_PROGRAM, &seed),
        Err(ComputeError::AlreadyInitialized)
    ));
    assert!(matches!(
        engine.set_dependencies(counter, &[]),
        Err(ComputeError::AlreadyInitialized)
    ));
}

#[test]
fn duplicate_and_invalid_names_are_rejected() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let seed = engine.create_state();
    engine
        .add_variable("counter", COUNTER_PROGRAM, &seed)
        .expect("register");

    assert!(matches!(
        engine.add_variable("counter", COUNTER_PROGRAM, &seed),
        Err(ComputeError::DuplicateVariable(_))
    ));
    assert!(matches!(
        engine.add_variable("2fast", COUNTER_PROGRAM, &seed),
        Err(ComputeError::InvalidName { .. })
    ));
    assert!(matches!(
        engine.add_variable("params", COUNTER_PROGRAM, &seed),
        Err(ComputeError::InvalidName { .. })
    ));
}

#[test]
fn seed_size_mismatch_is_rejected() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let wrong = compute::StateData::zeroed(GRID * 2, GRID);
    assert!(matches!(
        engine.add_variable("counter", COUNTER_PROGRAM, &wrong),
        Err(ComputeError::SeedSizeMismatch { .. })
    ));
}

#[test]
fn repeat_wrapping_samples_across_the_seam() {
    let Some(mut engine) = engine(2, 2) else {
        return;
    };
    let mut field_seed = engine.create_state();
    for y in 0..2 {
        field_seed.set_texel(0, y, [10.0, 0.0, 0.0, 0.0]);
        field_seed.set_texel(1, y, [20.0, 0.0, 0.0, 0.0]);
    }

    // Samples half a texture to the right of its own texel, which crosses
    // the right edge for the second column.
    let echo_program = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let uv = frag_coord.xy / resolution;
    return textureSample(field, field_sampler, uv + vec2<f32>(0.5, 0.0));
}
"#;

    let field = engine
        .add_variable("field", IDENTITY_FIELD, &field_seed)
        .expect("register field");
    let echo_seed = engine.create_state();
    let echo = engine
        .add_variable("echo", echo_program, &echo_seed)
        .expect("register echo");
    engine
        .set_sampling(field, SamplingConfig::wrapped(WrapMode::Repeat))
        .expect("sampling");
    engine.set_dependencies(field, &["field"]).expect("wire field");
    engine.set_dependencies(echo, &["field"]).expect("wire echo");
    engine.init().expect("init");

    engine.compute();
    let texels = engine.read_current(echo).expect("readback");
    for y in 0..2usize {
        let left = texels[(y * 2) * 4];
        let right = texels[(y * 2 + 1) * 4];
        assert_eq!(left, 20.0, "row {y}: left texel should read the right column");
        assert_eq!(right, 10.0, "row {y}: right texel should wrap to the left column");
    }
}

#[test]
fn half_float_targets_tick_but_do_not_read_back() {
    let gpu = match GpuContext::headless() {
        Ok(gpu) => gpu,
        Err(err) => {
            eprintln!("skipping: no GPU adapter available ({err:#})");
            return;
        }
    };
    if !gpu.capabilities().supports_target(TexelKind::F16) {
        eprintln!("skipping: adapter cannot render into f16 targets");
        return;
    }
    let mut engine = ComputeEngine::with_texel_kind(gpu, GRID, GRID, TexelKind::F16);
    let seed = engine.create_state();
    let counter = engine
        .add_variable("counter", COUNTER_PROGRAM, &seed)
        .expect("register");
    engine.set_dependencies(counter, &["counter"]).expect("wire");
    engine.init().expect("init");

    engine.compute();
    assert_eq!(engine.current_index(), 1);
    let err = engine
        .read_current(counter)
        .expect_err("f16 readback is unsupported");
    assert!(
        err.to_string().contains("Rgba16Float"),
        "unexpected readback error: {err:#}"
    );
}

#[test]
fn grids_beyond_the_adapter_limit_are_rejected() {
    let gpu = match GpuContext::headless() {
        Ok(gpu) => gpu,
        Err(err) => {
            eprintln!("skipping: no GPU adapter available ({err:#})");
            return;
        }
    };
    if !gpu.capabilities().supports_target(TexelKind::F32) {
        eprintln!("skipping: adapter cannot render into f32 targets");
        return;
    }
    let max = gpu.capabilities().max_texture_dimension;
    let mut engine = ComputeEngine::new(gpu, max + 1, 1);
    let seed = engine.create_state();
    assert!(matches!(
        engine.add_variable("counter", COUNTER_PROGRAM, &seed),
        Err(ComputeError::GridTooLarge { .. })
    ));
}

#[test]
fn render_texture_copies_into_a_target() {
    let Some(engine) = engine(GRID, GRID) else {
        return;
    };
    let mut state = engine.create_state();
    state.fill([4.0, 3.0, 2.0, 1.0]);
    let uploaded = engine.upload_state(&state, "copy source").expect("upload");
    let view = uploaded.create_view(&wgpu::TextureViewDescriptor::default());

    let target = engine.create_target("copy destination");
    engine.render_texture(&view, &target);
    let texels = target.read_texels(engine.gpu()).expect("readback");
    assert_all_texels(&texels, [4.0, 3.0, 2.0, 1.0]);
}

#[test]
fn filter_pass_transforms_inputs() {
    let Some(mut engine) = engine(GRID, GRID) else {
        return;
    };
    let mut seed = engine.create_state();
    seed.fill([1.0, 2.0, 3.0, 4.0]);
    let field = engine
        .add_variable("field", IDENTITY_FIELD, &seed)
        .expect("register");
    engine.set_dependencies(field, &["field"]).expect("wire");
    engine.init().expect("init");

    let double = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(field, vec2<i32>(frag_coord.xy), 0) * 2.0;
}
"#;
    let filter = FilterPass::new(
        engine.gpu(),
        "double filter",
        double,
        &["field"],
        GRID,
        GRID,
        TexelKind::F32,
    )
    .expect("compile filter");

    let output = engine.create_target("filter output");
    filter.run(
        engine.gpu(),
        &[engine.current_target(field).view()],
        &output,
    );
    let texels = output.read_texels(engine.gpu()).expect("readback");
    assert_all_texels(&texels, [2.0, 4.0, 6.0, 8.0]);
}

const IDENTITY_FIELD: &str = r#"
@fragment
fn main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(field, vec2<i32>(frag_coord.xy), 0);
}
"#;
