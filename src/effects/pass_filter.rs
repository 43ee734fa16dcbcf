//! Luminance threshold filter.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::error::{EffectPhase, Result};
use crate::gpu::{states, FullScreenPass, GpuContext, PassBindings, PassOptions, RenderContext, Texture};

/// Rec. 709 luma coefficients.
pub const LUMINANCE_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassFilterType {
    /// Keep texels brighter than the threshold.
    HighPass,
    /// Keep texels at or below the threshold.
    LowPass,
}

impl PassFilterType {
    fn shader_mode(self) -> u32 {
        match self {
            PassFilterType::HighPass => 0,
            PassFilterType::LowPass => 1,
        }
    }

    /// Whether a texel with `luminance` survives the filter.
    pub fn keeps(self, luminance: f32, threshold: f32) -> bool {
        let above = luminance > threshold;
        match self {
            PassFilterType::HighPass => above,
            PassFilterType::LowPass => !above,
        }
    }
}

pub fn luminance(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMINANCE_WEIGHTS[0] + rgb[1] * LUMINANCE_WEIGHTS[1] + rgb[2] * LUMINANCE_WEIGHTS[2]
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct FilterUniforms {
    threshold: f32,
    mode: u32,
    _padding: [u32; 2],
}

/// Writes the filtered source into an internally owned texture.
pub struct PassFilter {
    filter_type: PassFilterType,
    threshold: f32,
    pass: FullScreenPass,
    sampler: wgpu::Sampler,
    output: Option<Arc<Texture>>,
}

impl PassFilter {
    pub fn new(gpu: &GpuContext, filter_type: PassFilterType, threshold: f32) -> Self {
        let device = gpu.device();
        let threshold = threshold.max(0.0);
        Self {
            filter_type,
            threshold,
            pass: FullScreenPass::new(device, "Pass Filter", include_str!("../gpu/shaders/pass_filter.wgsl")),
            sampler: states::linear_clamp_sampler(device, "Pass Filter Sampler"),
            output: None,
        }
    }

    pub fn filter_type(&self) -> PassFilterType {
        self.filter_type
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Sets the luminance cutoff; negative values clamp to zero.
    pub fn set_threshold(&mut self, threshold: f32) {
        if threshold < 0.0 {
            log::warn!("pass filter threshold {} clamped to 0", threshold);
        }
        self.threshold = threshold.max(0.0);
    }

    /// Filters `src` and returns the result texture.
    ///
    /// The result has the size and format of `src`; it is reused across calls
    /// while those stay the same. Passes recorded earlier into the same
    /// context read it before a later call overwrites it.
    pub fn execute(&mut self, ctx: &mut RenderContext<'_>, src: &Texture) -> Result<Arc<Texture>> {
        let gpu = ctx.gpu();
        gpu.ensure_effect_format(src.format(), EffectPhase::Filter)?;
        let output = self.ensure_output(gpu, src)?;

        let uniforms = FilterUniforms {
            threshold: self.threshold,
            mode: self.filter_type.shader_mode(),
            _padding: [0; 2],
        };
        let device = ctx.device();
        let uniform_bind_group = self.pass.uniform_bind_group(device, "Filter", &uniforms);

        let bindings = PassBindings {
            source: src,
            sampler: &self.sampler,
            uniforms: &uniform_bind_group,
        };
        self.pass.execute(
            device,
            ctx.encoder_mut(),
            &output,
            &bindings,
            PassOptions::overwrite(EffectPhase::Filter),
        )?;

        Ok(output)
    }

    fn ensure_output(&mut self, gpu: &GpuContext, src: &Texture) -> Result<Arc<Texture>> {
        if let Some(existing) = &self.output {
            if existing.matches(src.width(), src.height(), src.format()) {
                return Ok(Arc::clone(existing));
            }
        }
        let texture = Arc::new(Texture::create_2d(
            gpu,
            "Pass Filter Output",
            src.width(),
            src.height(),
            src.format(),
            crate::gpu::SHADER_RESOURCE_RENDER_TARGET,
        )?);
        self.output = Some(Arc::clone(&texture));
        Ok(texture)
    }
}
