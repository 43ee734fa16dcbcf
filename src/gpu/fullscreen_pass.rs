//! Full-screen quad passes.
//!
//! A pass is one WGSL module exposing `vs_main` and `fs_main` with a fixed
//! binding model:
//! - group 0: source texture (binding 0) + filtering sampler (binding 1)
//! - group 1: uniform buffer (binding 0)
//!
//! Render pipelines depend on the target format and blend state, so they are
//! built on first use and reused afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::error::{EffectError, EffectPhase, Result};
use crate::gpu::Texture;

/// Vertex for fullscreen quad
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

impl QuadVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

const QUAD_VERTICES: &[QuadVertex] = &[
    QuadVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    QuadVertex { position: [ 1.0, -1.0], uv: [1.0, 1.0] },
    QuadVertex { position: [ 1.0,  1.0], uv: [1.0, 0.0] },
    QuadVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    QuadVertex { position: [ 1.0,  1.0], uv: [1.0, 0.0] },
    QuadVertex { position: [-1.0,  1.0], uv: [0.0, 0.0] },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
}

/// Resources bound for a single draw.
pub struct PassBindings<'a> {
    pub source: &'a Texture,
    pub sampler: &'a wgpu::Sampler,
    pub uniforms: &'a wgpu::BindGroup,
}

/// How a draw treats the existing target contents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TargetLoad {
    Clear(wgpu::Color),
    Load,
}

/// Output state of one draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassOptions {
    pub blend: Option<wgpu::BlendState>,
    pub load: TargetLoad,
    /// Reported by errors raised for this draw.
    pub phase: EffectPhase,
}

impl PassOptions {
    /// Clears the target to transparent black and writes without blending.
    pub fn overwrite(phase: EffectPhase) -> Self {
        Self {
            blend: None,
            load: TargetLoad::Clear(wgpu::Color::TRANSPARENT),
            phase,
        }
    }

    /// Keeps the target contents and blends over them.
    pub fn blend_over(blend: wgpu::BlendState, phase: EffectPhase) -> Self {
        Self {
            blend: Some(blend),
            load: TargetLoad::Load,
            phase,
        }
    }
}

impl TargetLoad {
    fn op(self) -> wgpu::LoadOp<wgpu::Color> {
        match self {
            TargetLoad::Clear(color) => wgpu::LoadOp::Clear(color),
            TargetLoad::Load => wgpu::LoadOp::Load,
        }
    }
}

pub struct FullScreenPass {
    label: String,
    shader: wgpu::ShaderModule,
    texture_layout: wgpu::BindGroupLayout,
    uniform_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    quad_vertex_buffer: wgpu::Buffer,
    pipelines: Mutex<HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>>,
}

impl FullScreenPass {
    pub fn new(device: &wgpu::Device, label: &str, shader_source: &str) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} Shader", label)),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{} Texture Layout", label)),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{} Uniform Layout", label)),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} Pipeline Layout", label)),
            bind_group_layouts: &[&texture_layout, &uniform_layout],
            push_constant_ranges: &[],
        });

        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Quad Buffer", label)),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            label: label.to_string(),
            shader,
            texture_layout,
            uniform_layout,
            pipeline_layout,
            quad_vertex_buffer,
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a uniform buffer holding `value` and the group-1 bind group
    /// referencing it.
    ///
    /// The bind group keeps the buffer alive. Passes whose constants change
    /// between draws build one per draw, so every recorded pass sees its own
    /// values even when several are recorded before a submit.
    pub fn uniform_bind_group<T: Pod>(&self, device: &wgpu::Device, name: &str, value: &T) -> wgpu::BindGroup {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} {} Uniform Buffer", self.label, name)),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} {} Uniform Bind Group", self.label, name)),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    /// Number of pipeline variants built so far.
    pub fn pipeline_count(&self) -> usize {
        self.lock_pipelines().len()
    }

    /// Draws the full-screen quad into `target`.
    pub fn execute(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &Texture,
        bindings: &PassBindings<'_>,
        options: PassOptions,
    ) -> Result<()> {
        let PassOptions { blend, load, phase } = options;
        if !target.has_usage(wgpu::TextureUsages::RENDER_ATTACHMENT) {
            return Err(EffectError::new(
                phase,
                format!("{}: target texture is not a render attachment", self.label),
            ));
        }
        if !bindings.source.has_usage(wgpu::TextureUsages::TEXTURE_BINDING) {
            return Err(EffectError::new(
                phase,
                format!("{}: source texture is not bindable as a shader resource", self.label),
            ));
        }

        let pipeline = self.pipeline(device, target.format(), blend);

        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Texture Bind Group", self.label)),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(bindings.source.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(bindings.sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&format!("{} Pass", self.label)),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: load.op(),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &texture_bind_group, &[]);
        pass.set_bind_group(1, bindings.uniforms, &[]);
        pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
        pass.draw(0..6, 0..1);

        Ok(())
    }

    fn lock_pipelines(&self) -> std::sync::MutexGuard<'_, HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>> {
        self.pipelines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pipeline(
        &self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        blend: Option<wgpu::BlendState>,
    ) -> Arc<wgpu::RenderPipeline> {
        let key = PipelineKey { format, blend };
        let mut pipelines = self.lock_pipelines();
        if let Some(pipeline) = pipelines.get(&key) {
            return Arc::clone(pipeline);
        }

        log::debug!("{}: building pipeline for {:?} (blend: {})", self.label, format, blend.is_some());
        let pipeline = Arc::new(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} Pipeline", self.label)),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        }));
        pipelines.insert(key, Arc::clone(&pipeline));
        pipeline
    }
}
