//! The ping-pong engine. Variables are registered against a fixed grid,
//! wired together by name, then frozen by `init`; after that every
//! `compute()` advances all of them by exactly one tick.

use anyhow::Result;

use crate::compile;
use crate::context::GpuContext;
use crate::error::ComputeError;
use crate::pipeline::{self, PassthroughPass};
use crate::target::{StateData, StateTarget};
use crate::types::{SamplingConfig, TexelKind};
use crate::variable::{validate_name, VariableDecl, VariableHandle};

/// A variable after `init`: compiled pipeline, target pair, and one
/// prebuilt dependency bind group per buffer index.
struct ReadyVariable {
    name: String,
    pipeline: wgpu::RenderPipeline,
    params_buffer: wgpu::Buffer,
    params_group: wgpu::BindGroup,
    targets: [StateTarget; 2],
    tick_groups: [wgpu::BindGroup; 2],
}

pub struct ComputeEngine {
    gpu: GpuContext,
    width: u32,
    height: u32,
    texel: TexelKind,
    vertex_module: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    passthrough: PassthroughPass,
    decls: Vec<VariableDecl>,
    ready: Vec<ReadyVariable>,
    current: usize,
    initialized: bool,
}

impl ComputeEngine {
    pub fn new(gpu: GpuContext, width: u32, height: u32) -> Self {
        Self::with_texel_kind(gpu, width, height, TexelKind::F32)
    }

    pub fn with_texel_kind(gpu: GpuContext, width: u32, height: u32, texel: TexelKind) -> Self {
        assert!(width > 0 && height > 0, "state grids must be non-empty");
        let vertex_module = compile::create_module(
            &gpu.device,
            "fullscreen vertex",
            compile::FULLSCREEN_VERTEX_WGSL,
        );
        let uniform_layout = pipeline::build_uniform_layout(&gpu.device);
        let passthrough = PassthroughPass::new(&gpu.device, &vertex_module, texel.format());
        Self {
            gpu,
            width,
            height,
            texel,
            vertex_module,
            uniform_layout,
            passthrough,
            decls: Vec::new(),
            ready: Vec::new(),
            current: 0,
            initialized: false,
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texel_kind(&self) -> TexelKind {
        self.texel
    }

    /// A zeroed CPU-side buffer matching the engine's grid, ready to be
    /// filled and passed to `add_variable` as a seed.
    pub fn create_state(&self) -> StateData {
        StateData::zeroed(self.width, self.height)
    }

    /// An extra render target matching the engine's grid and texel kind,
    /// for use with `FilterPass` or `render_texture`.
    pub fn create_target(&self, label: &str) -> StateTarget {
        StateTarget::new(&self.gpu.device, self.width, self.height, self.texel, label)
    }

    /// Upload a CPU-side state buffer into a sampleable data texture.
    pub fn upload_state(&self, data: &StateData, label: &str) -> Result<wgpu::Texture, ComputeError> {
        data.ensure_size(self.width, self.height)?;
        Ok(data.upload(&self.gpu, label))
    }

    /// Register a variable: a name, a WGSL fragment body, and its initial
    /// state. The seed is uploaded immediately; targets are not allocated
    /// until `init`.
    pub fn add_variable(
        &mut self,
        name: &str,
        program_body: &str,
        seed: &StateData,
    ) -> Result<VariableHandle, ComputeError> {
        if self.initialized {
            return Err(ComputeError::AlreadyInitialized);
        }
        validate_name(name)?;
        if self.decls.iter().any(|decl| decl.name == name) {
            return Err(ComputeError::DuplicateVariable(name.to_owned()));
        }
        let max = self.gpu.capabilities().max_texture_dimension;
        if self.width > max || self.height > max {
            return Err(ComputeError::GridTooLarge {
                width: self.width,
                height: self.height,
                max,
            });
        }
        seed.ensure_size(self.width, self.height)?;

        let seed_texture = seed.upload(&self.gpu, &format!("{name} seed"));
        // Zero-initialized by wgpu; holds the params vec4.
        let params_buffer = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{name} params")),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let handle = VariableHandle(self.decls.len());
        self.decls.push(VariableDecl {
            name: name.to_owned(),
            body: program_body.to_owned(),
            dependencies: Vec::new(),
            seed: seed_texture,
            sampling: SamplingConfig::default(),
            params_buffer,
        });
        Ok(handle)
    }

    /// Record which variables' current textures this program reads, in the
    /// order its header will declare them. Names are kept verbatim and only
    /// resolved at `init`; a variable may depend on itself.
    pub fn set_dependencies(
        &mut self,
        handle: VariableHandle,
        dependencies: &[&str],
    ) -> Result<(), ComputeError> {
        if self.initialized {
            return Err(ComputeError::AlreadyInitialized);
        }
        let decl = self.decl_mut(handle);
        decl.dependencies = dependencies.iter().map(|name| (*name).to_owned()).collect();
        Ok(())
    }

    /// Override the wrap/filter settings baked into the variable's targets.
    pub fn set_sampling(
        &mut self,
        handle: VariableHandle,
        sampling: SamplingConfig,
    ) -> Result<(), ComputeError> {
        if self.initialized {
            return Err(ComputeError::AlreadyInitialized);
        }
        self.decl_mut(handle).sampling = sampling;
        Ok(())
    }

    /// Write the variable's `params` uniform. Usable before and after
    /// `init`; takes effect on the next tick.
    pub fn set_params(&self, handle: VariableHandle, values: [f32; 4]) {
        let buffer = if let Some(ready) = self.ready.get(handle.0) {
            &ready.params_buffer
        } else {
            &self.decl(handle).params_buffer
        };
        self.gpu.queue.write_buffer(buffer, 0, bytemuck::cast_slice(&values));
    }

    /// Resolve, compile, allocate, and seed everything. After a successful
    /// return the variable set is frozen and `compute()` may be called.
    ///
    /// Dependency resolution runs for every variable before any render
    /// target is allocated, so a failed `init` leaves no half-built state
    /// behind.
    pub fn init(&mut self) -> Result<(), ComputeError> {
        if self.initialized {
            return Err(ComputeError::AlreadyInitialized);
        }

        let caps = self.gpu.capabilities();
        if !caps.supports_target(self.texel) {
            return Err(ComputeError::FloatTargetUnsupported(self.texel.format()));
        }
        if caps.sampled_textures_per_stage == 0 {
            return Err(ComputeError::VertexTextureUnsupported);
        }

        let names: Vec<String> = self.decls.iter().map(|decl| decl.name.clone()).collect();
        let dependencies: Vec<Vec<String>> = self
            .decls
            .iter()
            .map(|decl| decl.dependencies.clone())
            .collect();
        let resolved = resolve_dependencies(&names, &dependencies)?;

        // Linear sampling of f32 targets needs FLOAT32_FILTERABLE.
        let float_filterable = caps.float_filterable;
        for decl in &mut self.decls {
            if self.texel == TexelKind::F32 && decl.sampling.is_filtering() && !float_filterable {
                tracing::warn!(
                    variable = %decl.name,
                    "adapter cannot filter f32 textures; falling back to nearest sampling"
                );
                decl.sampling.filter = crate::types::FilterKind::Nearest;
            }
        }
        let samplings: Vec<SamplingConfig> =
            self.decls.iter().map(|decl| decl.sampling).collect();

        // Per-variable compile and allocation. Bind groups come afterwards,
        // once every dependency's targets exist.
        struct Built {
            decl: VariableDecl,
            pipeline: wgpu::RenderPipeline,
            params_group: wgpu::BindGroup,
            targets: [StateTarget; 2],
            dep_layout: wgpu::BindGroupLayout,
            resolved: Vec<usize>,
        }

        let mut built: Vec<Built> = Vec::with_capacity(self.decls.len());
        for (decl, resolved) in self.decls.drain(..).zip(resolved) {
            let name = decl.name.as_str();
            let dep_names: Vec<&str> = decl.dependencies.iter().map(String::as_str).collect();
            let source =
                compile::assemble_program(&decl.body, &dep_names, self.width, self.height);
            let fragment =
                compile::create_module(&self.gpu.device, &format!("{name} program"), &source);

            let dep_samplings: Vec<SamplingConfig> =
                resolved.iter().map(|&index| samplings[index]).collect();
            let dep_layout =
                self.gpu
                    .device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(&format!("{name} dependencies layout")),
                        entries: &pipeline::dependency_layout_entries(&dep_samplings),
                    });
            let render_pipeline = pipeline::build_fullscreen_pipeline(
                &self.gpu.device,
                &format!("{name} pipeline"),
                &[&self.uniform_layout, &dep_layout],
                &self.vertex_module,
                &fragment,
                self.texel.format(),
            );

            let params_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{name} params group")),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: decl.params_buffer.as_entire_binding(),
                }],
            });

            let targets = [
                StateTarget::new(
                    &self.gpu.device,
                    self.width,
                    self.height,
                    self.texel,
                    &format!("{name} target 0"),
                ),
                StateTarget::new(
                    &self.gpu.device,
                    self.width,
                    self.height,
                    self.texel,
                    &format!("{name} target 1"),
                ),
            ];

            tracing::debug!(
                variable = name,
                dependencies = ?decl.dependencies,
                "compiled variable pipeline"
            );
            built.push(Built {
                decl,
                pipeline: render_pipeline,
                params_group,
                targets,
                dep_layout,
                resolved,
            });
        }

        let samplers: Vec<wgpu::Sampler> = built
            .iter()
            .map(|item| {
                let sampling = item.decl.sampling;
                self.gpu.device.create_sampler(&wgpu::SamplerDescriptor {
                    label: Some(&format!("{} sampler", item.decl.name)),
                    address_mode_u: sampling.wrap_u.address_mode(),
                    address_mode_v: sampling.wrap_v.address_mode(),
                    address_mode_w: wgpu::AddressMode::ClampToEdge,
                    mag_filter: sampling.filter.filter_mode(),
                    min_filter: sampling.filter.filter_mode(),
                    ..Default::default()
                })
            })
            .collect();

        // Bind group k of a variable binds every dependency's target k, so
        // a tick reads entirely from the current set of textures.
        let mut tick_groups: Vec<[wgpu::BindGroup; 2]> = Vec::with_capacity(built.len());
        for item in &built {
            let groups: [wgpu::BindGroup; 2] = std::array::from_fn(|buffer_index| {
                let mut entries = Vec::with_capacity(item.resolved.len() * 2);
                for (slot, &dep_index) in item.resolved.iter().enumerate() {
                    entries.push(wgpu::BindGroupEntry {
                        binding: (2 * slot) as u32,
                        resource: wgpu::BindingResource::TextureView(
                            &built[dep_index].targets[buffer_index].view,
                        ),
                    });
                    entries.push(wgpu::BindGroupEntry {
                        binding: (2 * slot + 1) as u32,
                        resource: wgpu::BindingResource::Sampler(&samplers[dep_index]),
                    });
                }
                self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("{} dependencies", item.decl.name)),
                    layout: &item.dep_layout,
                    entries: &entries,
                })
            });
            tick_groups.push(groups);
        }

        // Seed both targets so tick zero reads the initial state regardless
        // of buffer parity.
        for item in &built {
            let seed_view = item
                .decl
                .seed
                .create_view(&wgpu::TextureViewDescriptor::default());
            self.render_texture(&seed_view, &item.targets[0]);
            self.render_texture(&seed_view, &item.targets[1]);
        }

        self.ready = built
            .into_iter()
            .zip(tick_groups)
            .map(|(item, tick_groups)| ReadyVariable {
                name: item.decl.name,
                pipeline: item.pipeline,
                params_buffer: item.decl.params_buffer,
                params_group: item.params_group,
                targets: item.targets,
                tick_groups,
            })
            .collect();
        self.current = 0;
        self.initialized = true;
        tracing::debug!(variables = self.ready.len(), "engine initialized");
        Ok(())
    }

    /// Advance every variable by one tick: each program reads the current
    /// textures of its dependencies and writes its own alternate target.
    /// The shared buffer index flips exactly once, after all variables.
    pub fn compute(&mut self) {
        debug_assert!(self.initialized, "compute() requires a successful init()");
        let current = self.current;
        let next = 1 - current;

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compute tick"),
            });
        for variable in &self.ready {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&variable.name),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &variable.targets[next].view,
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
            pass.set_pipeline(&variable.pipeline);
            pass.set_bind_group(0, &variable.params_group, &[]);
            pass.set_bind_group(1, &variable.tick_groups[current], &[]);
            pass.draw(0..3, 0..1);
        }
        self.gpu.queue.submit(Some(encoder.finish()));
        self.current = next;
    }

    /// The target holding the variable's state as of the last completed
    /// tick. Bind this when consuming results.
    pub fn current_target(&self, handle: VariableHandle) -> &StateTarget {
        &self.ready_var(handle).targets[self.current]
    }

    /// The other half of the pair, overwritten by the next tick.
    pub fn alternate_target(&self, handle: VariableHandle) -> &StateTarget {
        &self.ready_var(handle).targets[1 - self.current]
    }

    /// Parity of the shared buffer index: starts at 0, flips every tick.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Read the variable's current state back to the CPU.
    pub fn read_current(&self, handle: VariableHandle) -> Result<Vec<f32>> {
        self.current_target(handle).read_texels(&self.gpu)
    }

    /// Copy a texture into a target through the pass-through pipeline. Used
    /// internally for seeding; public so hosts can (re)fill targets too.
    pub fn render_texture(&self, source: &wgpu::TextureView, target: &StateTarget) {
        let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("passthrough source"),
            layout: &self.passthrough.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(source),
            }],
        });
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("passthrough copy"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("passthrough copy"),
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
            pass.set_pipeline(&self.passthrough.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.gpu.queue.submit(Some(encoder.finish()));
    }

    fn decl(&self, handle: VariableHandle) -> &VariableDecl {
        self.decls
            .get(handle.0)
            .expect("variable handle does not belong to this engine")
    }

    fn decl_mut(&mut self, handle: VariableHandle) -> &mut VariableDecl {
        self.decls
            .get_mut(handle.0)
            .expect("variable handle does not belong to this engine")
    }

    fn ready_var(&self, handle: VariableHandle) -> &ReadyVariable {
        self.ready
            .get(handle.0)
            .expect("target access requires a successful init()")
    }
}

/// Map each variable's dependency names to variable indices. Fails on the
/// first unknown name, reporting both sides of the missing edge.
fn resolve_dependencies(
    names: &[String],
    dependencies: &[Vec<String>],
) -> Result<Vec<Vec<usize>>, ComputeError> {
    dependencies
        .iter()
        .enumerate()
        .map(|(variable_index, deps)| {
            deps.iter()
                .map(|dep| {
                    names.iter().position(|name| name == dep).ok_or_else(|| {
                        ComputeError::UnknownDependency {
                            variable: names[variable_index].clone(),
                            dependency: dep.clone(),
                        }
                    })
                })
                .collect()
        })
        .collect()
}
