//! Variable records and the naming rules their identifiers must satisfy.
//! A variable's name is spliced into generated shader source, so validation
//! here is what keeps `assemble_program` from emitting invalid WGSL.

use crate::error::ComputeError;
use crate::types::SamplingConfig;

/// Opaque handle returned by `add_variable`, valid for the engine that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableHandle(pub(crate) usize);

/// Identifiers the generated header claims for itself.
const RESERVED: &[&str] = &["resolution", "params", "main", "source"];

pub(crate) const SAMPLER_SUFFIX: &str = "_sampler";

/// A registered variable before `init` resolves and freezes it.
pub(crate) struct VariableDecl {
    pub name: String,
    pub body: String,
    /// Dependency names exactly as given; resolved to indices at init.
    pub dependencies: Vec<String>,
    pub seed: wgpu::Texture,
    pub sampling: SamplingConfig,
    pub params_buffer: wgpu::Buffer,
}

/// Check that `name` is a usable WGSL identifier that cannot collide with
/// anything the generated header declares.
pub(crate) fn validate_name(name: &str) -> Result<(), ComputeError> {
    let invalid = |reason: &'static str| ComputeError::InvalidName {
        name: name.to_owned(),
        reason,
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("name is empty")),
        Some(first) if first.is_ascii_digit() => {
            return Err(invalid("name starts with a digit"));
        }
        Some(first) if !(first.is_ascii_alphabetic() || first == '_') => {
            return Err(invalid("name starts with a non-identifier character"));
        }
        Some(_) => {}
    }
    if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
        return Err(invalid("name contains a non-identifier character"));
    }
    // WGSL reserves `_` and the `__` prefix outright.
    if name == "_" || name.starts_with("__") {
        return Err(invalid("name is reserved by the shading language"));
    }
    if RESERVED.contains(&name) {
        return Err(invalid("name is reserved by the generated shader header"));
    }
    if name.ends_with(SAMPLER_SUFFIX) {
        return Err(invalid("name would collide with a derived sampler identifier"));
    }
    Ok(())
}
