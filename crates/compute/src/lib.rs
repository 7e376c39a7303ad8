//! Ping-pong GPU compute: named state textures advanced by per-texel
//! fragment programs.
//!
//! The model is a set of *variables*, each one a `width x height` grid of
//! `vec4<f32>` texels backed by a pair of render targets. Every variable has
//! a WGSL fragment program; every tick, each program reads the *current*
//! texture of each variable it depends on and writes its own *next* target.
//! One shared buffer index flips after all variables have run, so within a
//! tick every program observes the same consistent snapshot, dependency
//! cycles and self-dependencies included.
//!
//! Typical use:
//!
//! ```no_run
//! use compute::{ComputeEngine, GpuContext};
//!
//! # fn main() -> anyhow::Result<()> {
//! let gpu = GpuContext::headless()?;
//! let mut engine = ComputeEngine::new(gpu, 256, 256);
//!
//! let seed = engine.create_state();
//! let heat = engine.add_variable("heat", HEAT_PROGRAM, &seed)?;
//! engine.set_dependencies(heat, &["heat"])?;
//!
//! engine.init()?;
//! for _ in 0..100 {
//!     engine.compute();
//! }
//! let texels = engine.read_current(heat)?;
//! # let _ = texels;
//! # Ok(())
//! # }
//! # const HEAT_PROGRAM: &str = "";
//! ```
//!
//! Program bodies receive a generated header declaring a `resolution`
//! constant, a `params: vec4<f32>` uniform, and a `texture_2d<f32>` plus
//! sampler pair per dependency, named after the dependency. The body itself
//! defines `@fragment fn main(@builtin(position) position: vec4<f32>) ->
//! @location(0) vec4<f32>`; `position.xy / resolution` gives the usual
//! normalized texel-center coordinate.

mod compile;
mod context;
mod engine;
mod error;
mod filter;
mod pipeline;
mod target;
mod types;
mod variable;

pub use context::{GpuCapabilities, GpuContext};
pub use engine::ComputeEngine;
pub use error::ComputeError;
pub use filter::FilterPass;
pub use target::{StateData, StateTarget};
pub use types::{FilterKind, SamplingConfig, TexelKind, WrapMode};
pub use variable::VariableHandle;
