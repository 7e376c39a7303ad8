//! One-shot full-screen passes outside the ping-pong loop: run an arbitrary
//! per-texel program over N named input textures into a single target.
//! Useful for post-processing a variable's state or preparing seed data on
//! the GPU.

use crate::compile;
use crate::context::GpuContext;
use crate::error::ComputeError;
use crate::pipeline;
use crate::target::StateTarget;
use crate::types::{SamplingConfig, TexelKind};
use crate::variable::validate_name;

pub struct FilterPass {
    pipeline: wgpu::RenderPipeline,
    input_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    params_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    input_count: usize,
}

impl FilterPass {
    /// Compile a filter. `inputs` names the textures the body may read; the
    /// generated header declares them exactly as it does for variables, so
    /// a variable's program body and a filter body are interchangeable.
    pub fn new(
        gpu: &GpuContext,
        label: &str,
        body: &str,
        inputs: &[&str],
        width: u32,
        height: u32,
        kind: TexelKind,
    ) -> Result<Self, ComputeError> {
        for name in inputs {
            validate_name(name)?;
        }

        let source = compile::assemble_program(body, inputs, width, height);
        let vertex = compile::create_module(
            &gpu.device,
            "fullscreen vertex",
            compile::FULLSCREEN_VERTEX_WGSL,
        );
        let fragment = compile::create_module(&gpu.device, label, &source);

        let uniform_layout = pipeline::build_uniform_layout(&gpu.device);
        // Filters read inputs with nearest/clamp sampling.
        let samplings = vec![SamplingConfig::default(); inputs.len()];
        let input_layout = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &pipeline::dependency_layout_entries(&samplings),
            });
        let render_pipeline = pipeline::build_fullscreen_pipeline(
            &gpu.device,
            label,
            &[&uniform_layout, &input_layout],
            &vertex,
            &fragment,
            kind.format(),
        );

        let params_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            pipeline: render_pipeline,
            input_layout,
            params_buffer,
            params_group,
            sampler,
            input_count: inputs.len(),
        })
    }

    pub fn set_params(&self, gpu: &GpuContext, values: [f32; 4]) {
        gpu.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&values));
    }

    /// Run the filter once. `inputs` must match the names given to `new`,
    /// in order and count.
    pub fn run(&self, gpu: &GpuContext, inputs: &[&wgpu::TextureView], target: &StateTarget) {
        assert_eq!(
            inputs.len(),
            self.input_count,
            "filter input count does not match its declaration"
        );

        let mut entries = Vec::with_capacity(inputs.len() * 2);
        for (slot, view) in inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: (2 * slot) as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: (2 * slot + 1) as u32,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        let input_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("filter inputs"),
            layout: &self.input_layout,
            entries: &entries,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filter pass"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("filter pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.params_group, &[]);
            pass.set_bind_group(1, &input_group, &[]);
            pass.draw(0..3, 0..1);
        }
        gpu.queue.submit(Some(encoder.finish()));
    }
}
