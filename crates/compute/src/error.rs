use wgpu::TextureFormat;

/// Checked failures surfaced by the engine's registration and init paths.
///
/// `compute()` deliberately has no error channel; everything that can be
/// validated is validated before the first tick.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("adapter cannot render into {0:?}; no float render-target support")]
    FloatTargetUnsupported(TextureFormat),
    #[error("adapter reports zero vertex-stage texture units; state textures could not feed vertex shaders")]
    VertexTextureUnsupported,
    #[error("grid {width}x{height} exceeds the adapter's maximum texture dimension {max}")]
    GridTooLarge { width: u32, height: u32, max: u32 },
    #[error("variable dependency not found: variable={variable}, dependency={dependency}")]
    UnknownDependency {
        variable: String,
        dependency: String,
    },
    #[error("invalid variable name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("variable '{0}' is already registered")]
    DuplicateVariable(String),
    #[error("seed data holds {actual} floats but a {width}x{height} grid needs {expected}")]
    SeedSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("engine is already initialized; variables and dependencies are frozen")]
    AlreadyInitialized,
}
