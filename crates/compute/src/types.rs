//! Small shared value types for texel formats and dependency sampling.

/// Texel storage for state targets. `F32` is the default; `F16` halves the
/// footprint at the cost of precision and readback support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TexelKind {
    #[default]
    F32,
    F16,
}

impl TexelKind {
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            TexelKind::F32 => wgpu::TextureFormat::Rgba32Float,
            TexelKind::F16 => wgpu::TextureFormat::Rgba16Float,
        }
    }

}

/// How a variable's targets behave when sampled outside [0, 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

impl WrapMode {
    pub(crate) fn address_mode(self) -> wgpu::AddressMode {
        match self {
            WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            WrapMode::Repeat => wgpu::AddressMode::Repeat,
            WrapMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    #[default]
    Nearest,
    Linear,
}

impl FilterKind {
    pub(crate) fn filter_mode(self) -> wgpu::FilterMode {
        match self {
            FilterKind::Nearest => wgpu::FilterMode::Nearest,
            FilterKind::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Sampling settings applied to a variable's pair of targets. Defaults match
/// state-machine use: clamp to edge, nearest, no filtering surprises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplingConfig {
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub filter: FilterKind,
}

impl SamplingConfig {
    pub fn wrapped(wrap: WrapMode) -> Self {
        Self {
            wrap_u: wrap,
            wrap_v: wrap,
            filter: FilterKind::Nearest,
        }
    }

    pub(crate) fn is_filtering(self) -> bool {
        self.filter == FilterKind::Linear
    }
}
