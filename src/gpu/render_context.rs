//! Command recording.

use bytemuck::{Pod, Zeroable};

use crate::error::{EffectPhase, Result};
use crate::gpu::fullscreen_pass::{FullScreenPass, PassBindings, PassOptions};
use crate::gpu::{states, GpuContext, Texture};

/// Uniforms for the blit shader: source rectangle in normalized UVs.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct SrcRectUniforms {
    pub offset: [f32; 2],
    pub scale: [f32; 2],
}

impl SrcRectUniforms {
    pub fn full() -> Self {
        Self {
            offset: glam::Vec2::ZERO.to_array(),
            scale: glam::Vec2::ONE.to_array(),
        }
    }
}

pub(crate) const BLIT_SHADER: &str = include_str!("shaders/blit.wgsl");

/// Full-rect texture copy with linear filtering.
pub(crate) struct Blitter {
    pass: FullScreenPass,
    sampler: wgpu::Sampler,
    src_rect_bind_group: wgpu::BindGroup,
}

impl Blitter {
    pub fn new(device: &wgpu::Device) -> Self {
        let pass = FullScreenPass::new(device, "Blit", BLIT_SHADER);
        let src_rect_bind_group = pass.uniform_bind_group(device, "SrcRect", &SrcRectUniforms::full());
        Self {
            sampler: states::linear_clamp_sampler(device, "Blit Sampler"),
            pass,
            src_rect_bind_group,
        }
    }

    fn blit(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        src: &Texture,
        dst: &Texture,
    ) -> Result<()> {
        let bindings = PassBindings {
            source: src,
            sampler: &self.sampler,
            uniforms: &self.src_rect_bind_group,
        };
        self.pass
            .execute(device, encoder, dst, &bindings, PassOptions::overwrite(EffectPhase::Blit))
    }
}

/// Records GPU work for one submission.
///
/// Effects append passes through [`encoder_mut`](Self::encoder_mut); nothing
/// reaches the GPU until [`submit`](Self::submit) is called. Passes run in
/// recording order and each carries its own constants, so one effect may be
/// executed several times before a submit.
pub struct RenderContext<'g> {
    gpu: &'g GpuContext,
    encoder: wgpu::CommandEncoder,
}

impl<'g> RenderContext<'g> {
    pub fn new(gpu: &'g GpuContext, label: &str) -> Self {
        let encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        Self { gpu, encoder }
    }

    pub fn gpu(&self) -> &'g GpuContext {
        self.gpu
    }

    pub fn device(&self) -> &'g wgpu::Device {
        self.gpu.device()
    }

    pub fn queue(&self) -> &'g wgpu::Queue {
        self.gpu.queue()
    }

    pub fn encoder_mut(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }

    /// Copies `src` into `dst`, resampling with linear filtering if sizes differ.
    pub fn blit(&mut self, src: &Texture, dst: &Texture) -> Result<()> {
        self.gpu
            .blitter()
            .blit(self.gpu.device(), &mut self.encoder, src, dst)
    }

    /// Finishes recording and submits to the queue.
    pub fn submit(self) -> wgpu::SubmissionIndex {
        self.gpu.queue().submit(std::iter::once(self.encoder.finish()))
    }
}
