use anyhow::{Context as AnyhowContext, Result};

use crate::types::TexelKind;

/// What the selected adapter can do, as far as this engine cares. Probed once
/// at device creation and consulted by `ComputeEngine::init`.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    /// Formats that can serve as a render pass color attachment.
    pub float_target: bool,
    pub half_target: bool,
    /// Sampled-texture units visible to a single shader stage. Zero would
    /// mean state textures cannot feed vertex work at all.
    pub sampled_textures_per_stage: u32,
    pub max_texture_dimension: u32,
    pub float_filterable: bool,
}

impl GpuCapabilities {
    fn probe(adapter: &wgpu::Adapter) -> Self {
        let renderable = |format: wgpu::TextureFormat| {
            adapter
                .get_texture_format_features(format)
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        };
        let limits = adapter.limits();
        Self {
            float_target: renderable(wgpu::TextureFormat::Rgba32Float),
            half_target: renderable(wgpu::TextureFormat::Rgba16Float),
            sampled_textures_per_stage: limits.max_sampled_textures_per_shader_stage,
            max_texture_dimension: limits.max_texture_dimension_2d,
            float_filterable: adapter
                .features()
                .contains(wgpu::Features::FLOAT32_FILTERABLE),
        }
    }

    pub fn supports_target(&self, kind: TexelKind) -> bool {
        match kind {
            TexelKind::F32 => self.float_target,
            TexelKind::F16 => self.half_target,
        }
    }
}

/// A headless device/queue pair. No surface, no window; every draw in this
/// crate lands in an offscreen target.
pub struct GpuContext {
    pub _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    capabilities: GpuCapabilities,
}

impl GpuContext {
    pub fn headless() -> Result<Self> {
        Self::with_power_preference(wgpu::PowerPreference::HighPerformance)
    }

    pub fn with_power_preference(power_preference: wgpu::PowerPreference) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        let capabilities = GpuCapabilities::probe(&adapter);
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            float_target = capabilities.float_target,
            "selected GPU adapter"
        );

        // FLOAT32_FILTERABLE is optional; without it every f32 dependency
        // read must stay on nearest sampling.
        let mut required_features = wgpu::Features::empty();
        if capabilities.float_filterable {
            required_features |= wgpu::Features::FLOAT32_FILTERABLE;
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("texflow device"),
            required_features,
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        Ok(Self {
            _instance: instance,
            device,
            queue,
            capabilities,
        })
    }

    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }
}
