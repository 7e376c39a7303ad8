//! Scenario files describe a complete compute run in TOML: the grid, the
//! tick count, and the variables with their programs, seeds, and wiring.
//! Program paths are resolved relative to the scenario file so a scenario
//! and its shaders can travel together as a directory.
//!
//! ```toml
//! version = 1
//! size = { width = 256, height = 256 }
//! ticks = 100
//!
//! [[variable]]
//! name = "position"
//! program = "position.wgsl"
//! depends = ["position", "velocity"]
//! seed = { kind = "zero" }
//!
//! [[variable]]
//! name = "velocity"
//! program = "velocity.wgsl"
//! depends = ["velocity"]
//! seed = { kind = "random", min = -1.0, max = 1.0, seed = 7 }
//! params = [0.016, 0.0, 0.0, 0.0]
//! ```

use std::path::{Path, PathBuf};

use compute::StateData;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

pub const SCENARIO_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scenario")]
    Parse(#[from] toml::de::Error),
    #[error("unsupported scenario version {found} (this build understands {SCENARIO_VERSION})")]
    Version { found: u32 },
    #[error("scenario declares no variables")]
    Empty,
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("variable `{variable}` has an inverted random seed range ({min} > {max})")]
    SeedRange {
        variable: String,
        min: f32,
        max: f32,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default = "default_version")]
    pub version: u32,
    pub size: GridSize,
    #[serde(default = "default_ticks")]
    pub ticks: u32,
    #[serde(rename = "variable", default)]
    pub variables: Vec<VariableSpec>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSpec {
    pub name: String,
    /// WGSL fragment body, relative to the scenario file until `load`
    /// resolves it.
    pub program: PathBuf,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub seed: SeedSpec,
    /// Initial value for the variable's `params` uniform.
    #[serde(default)]
    pub params: Option<[f32; 4]>,
}

/// How a variable's initial state is produced. Random seeds carry an
/// explicit RNG seed so a scenario always produces the same run.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedSpec {
    #[default]
    Zero,
    Constant {
        texel: [f32; 4],
    },
    Random {
        min: f32,
        max: f32,
        seed: u64,
    },
}

impl SeedSpec {
    pub fn build(&self, width: u32, height: u32) -> StateData {
        let mut state = StateData::zeroed(width, height);
        match self {
            SeedSpec::Zero => {}
            SeedSpec::Constant { texel } => state.fill(*texel),
            SeedSpec::Random { min, max, seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                for y in 0..height {
                    for x in 0..width {
                        state.set_texel(
                            x,
                            y,
                            [
                                rng.gen_range(*min..=*max),
                                rng.gen_range(*min..=*max),
                                rng.gen_range(*min..=*max),
                                rng.gen_range(*min..=*max),
                            ],
                        );
                    }
                }
            }
        }
        state
    }
}

fn default_version() -> u32 {
    SCENARIO_VERSION
}

fn default_ticks() -> u32 {
    1
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_owned(),
            source,
        })?;
        let mut scenario = Self::from_toml_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        scenario.resolve_program_paths(base);
        Ok(scenario)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = toml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.version != SCENARIO_VERSION {
            return Err(ScenarioError::Version {
                found: self.version,
            });
        }
        if self.size.width == 0 || self.size.height == 0 {
            return Err(ScenarioError::EmptyGrid {
                width: self.size.width,
                height: self.size.height,
            });
        }
        if self.variables.is_empty() {
            return Err(ScenarioError::Empty);
        }
        for variable in &self.variables {
            if let SeedSpec::Random { min, max, .. } = variable.seed {
                if min > max {
                    return Err(ScenarioError::SeedRange {
                        variable: variable.name.clone(),
                        min,
                        max,
                    });
                }
            }
        }
        Ok(())
    }

    /// Rebase relative program paths onto the scenario file's directory.
    pub fn resolve_program_paths(&mut self, base: &Path) {
        for variable in &mut self.variables {
            if variable.program.is_relative() {
                variable.program = base.join(&variable.program);
            }
        }
    }
}
