//! Offscreen state storage: the GPU render targets that hold per-texel state
//! and the CPU-side buffers used to seed and read them back.

use anyhow::{bail, Context as AnyhowContext, Result};

use crate::context::GpuContext;
use crate::error::ComputeError;
use crate::types::TexelKind;

/// One render target: a texture that can be drawn into, sampled from, and
/// copied out. Variables own these in pairs; hosts can also create them
/// ad hoc for `FilterPass` output.
pub struct StateTarget {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl StateTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, kind: TexelKind, label: &str) -> Self {
        let format = kind.format();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Copy the target back to the CPU as `width * height * 4` floats in
    /// row-major order. Synchronous; meant for harnesses and tests, not for
    /// per-tick use.
    pub fn read_texels(&self, gpu: &GpuContext) -> Result<Vec<f32>> {
        if self.format != wgpu::TextureFormat::Rgba32Float {
            bail!(
                "reading back {:?} targets is not supported; use the f32 texel kind",
                self.format
            );
        }

        let bytes_per_row = self.width * 16;
        let padded_bytes_per_row = bytes_per_row
            .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("state readback staging"),
            size: u64::from(padded_bytes_per_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("state readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        gpu.device
            .poll(wgpu::PollType::Wait)
            .context("device poll failed while waiting for readback")?;
        rx.recv()
            .context("readback mapping callback dropped")?
            .context("failed to map readback staging buffer")?;

        let mapped = slice.get_mapped_range();
        let mut texels = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for row in 0..self.height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + bytes_per_row as usize;
            texels.extend_from_slice(bytemuck::cast_slice(&mapped[start..end]));
        }
        drop(mapped);
        staging.unmap();
        Ok(texels)
    }
}

/// CPU-side state buffer, `width * height * 4` floats, zero-initialized.
/// Fill it texel by texel and hand it to `add_variable` as the seed.
#[derive(Debug, Clone)]
pub struct StateData {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl StateData {
    pub fn zeroed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, texel: [f32; 4]) {
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&texel);
        }
    }

    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let offset = self.offset(x, y);
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }

    pub fn set_texel(&mut self, x: u32, y: u32, texel: [f32; 4]) {
        let offset = self.offset(x, y);
        self.data[offset..offset + 4].copy_from_slice(&texel);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "texel out of bounds");
        (y as usize * self.width as usize + x as usize) * 4
    }

    pub(crate) fn ensure_size(&self, width: u32, height: u32) -> Result<(), ComputeError> {
        let expected = width as usize * height as usize * 4;
        if self.width != width || self.height != height || self.data.len() != expected {
            return Err(ComputeError::SeedSizeMismatch {
                width,
                height,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Upload into a freshly created `Rgba32Float` data texture. Seeds are
    /// always full precision; the engine converts on the seeding pass if the
    /// targets are half float.
    pub(crate) fn upload(&self, gpu: &GpuContext, label: &str) -> wgpu::Texture {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&self.data),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * 16),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        texture
    }
}
