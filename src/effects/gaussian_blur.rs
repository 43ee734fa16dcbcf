//! Separable Gaussian blur.
//!
//! The kernel is applied as a horizontal pass into a scratch texture followed
//! by a vertical pass into the destination FBO. Because the second pass never
//! reads the destination, the source may be the destination's own color
//! target (in-place blur).

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::error::{EffectError, EffectPhase, Result};
use crate::gpu::{states, Fbo, FullScreenPass, GpuContext, PassBindings, PassOptions, RenderContext, Texture};

/// Largest supported kernel width. Widths are always odd.
pub const MAX_KERNEL_WIDTH: u32 = 31;

const MAX_WEIGHTS: usize = (MAX_KERNEL_WIDTH as usize / 2) + 1;

/// Forces `width` odd and into `1..=MAX_KERNEL_WIDTH`.
pub fn normalize_kernel_width(width: u32) -> u32 {
    (width | 1).min(MAX_KERNEL_WIDTH)
}

/// Normalized one-sided Gaussian weights for a kernel of `kernel_width` taps.
///
/// Returns `kernel_width / 2 + 1` values: index 0 is the center tap, index `i`
/// applies at offsets `+i` and `-i`. The full symmetric kernel sums to 1.
pub fn kernel_weights(kernel_width: u32, sigma: f32) -> Vec<f32> {
    let radius = (normalize_kernel_width(kernel_width) / 2) as i32;
    let sigma = sigma.max(f32::MIN_POSITIVE);
    let coefficient = |x: i32| -> f32 {
        let x = x as f32;
        let norm = 1.0 / ((2.0 * std::f32::consts::PI).sqrt() * sigma);
        norm * (-(x * x) / (2.0 * sigma * sigma)).exp()
    };

    let one_sided: Vec<f32> = (0..=radius).map(coefficient).collect();
    let total: f32 = one_sided[0] + 2.0 * one_sided[1..].iter().sum::<f32>();
    if total <= 0.0 || !total.is_finite() {
        // Degenerate sigma: collapse to an identity kernel.
        let mut identity = vec![0.0; one_sided.len()];
        identity[0] = 1.0;
        return identity;
    }
    one_sided.into_iter().map(|w| w / total).collect()
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct BlurUniforms {
    texel_step: [f32; 2],
    radius: u32,
    _padding: u32,
    weights: [[f32; 4]; MAX_WEIGHTS / 4],
}

impl BlurUniforms {
    fn new(texel_step: [f32; 2], weights: &[f32]) -> Self {
        let mut packed = [[0.0f32; 4]; MAX_WEIGHTS / 4];
        for (i, w) in weights.iter().enumerate().take(MAX_WEIGHTS) {
            packed[i / 4][i % 4] = *w;
        }
        Self {
            texel_step,
            radius: weights.len().saturating_sub(1) as u32,
            _padding: 0,
            weights: packed,
        }
    }
}

pub struct GaussianBlur {
    kernel_width: u32,
    sigma: f32,
    weights: Vec<f32>,
    pass: FullScreenPass,
    sampler: wgpu::Sampler,
    scratch: Option<Arc<Texture>>,
}

impl GaussianBlur {
    pub fn new(gpu: &GpuContext, kernel_width: u32, sigma: f32) -> Self {
        let device = gpu.device();
        let kernel_width = normalize_kernel_width(kernel_width);
        let sigma = sigma.max(crate::params::BLOOM_SIGMA.min.unwrap_or(0.001));
        let weights = kernel_weights(kernel_width, sigma);

        Self {
            kernel_width,
            sigma,
            weights,
            pass: FullScreenPass::new(device, "Gaussian Blur", include_str!("../gpu/shaders/gaussian_blur.wgsl")),
            sampler: states::linear_clamp_sampler(device, "Gaussian Blur Sampler"),
            scratch: None,
        }
    }

    pub fn kernel_width(&self) -> u32 {
        self.kernel_width
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn set_kernel_width(&mut self, kernel_width: u32) {
        let normalized = normalize_kernel_width(kernel_width);
        if normalized != kernel_width {
            log::debug!("kernel width {} adjusted to {}", kernel_width, normalized);
        }
        if normalized != self.kernel_width {
            self.kernel_width = normalized;
            self.weights = kernel_weights(self.kernel_width, self.sigma);
        }
    }

    pub fn set_sigma(&mut self, sigma: f32) {
        let min_sigma = crate::params::BLOOM_SIGMA.min.unwrap_or(0.001);
        if sigma < min_sigma {
            log::warn!("blur sigma {} clamped to {}", sigma, min_sigma);
        }
        let sigma = sigma.max(min_sigma);
        if sigma != self.sigma {
            self.sigma = sigma;
            self.weights = kernel_weights(self.kernel_width, self.sigma);
        }
    }

    /// Blurs `src` into color target 0 of `dst`.
    pub fn execute(&mut self, ctx: &mut RenderContext<'_>, src: &Texture, dst: &Fbo) -> Result<()> {
        let target = dst
            .color_texture(0)
            .ok_or_else(|| EffectError::new(EffectPhase::Blur, "destination FBO has no color target 0"))?
            .clone();
        let gpu = ctx.gpu();
        gpu.ensure_effect_format(src.format(), EffectPhase::Blur)?;
        let scratch = self.ensure_scratch(gpu, src)?;

        let horizontal = BlurUniforms::new([1.0 / src.width() as f32, 0.0], &self.weights);
        let vertical = BlurUniforms::new([0.0, 1.0 / scratch.height() as f32], &self.weights);
        let device = ctx.device();
        let horizontal_bind_group = self.pass.uniform_bind_group(device, "Horizontal", &horizontal);
        let vertical_bind_group = self.pass.uniform_bind_group(device, "Vertical", &vertical);

        self.pass.execute(
            device,
            ctx.encoder_mut(),
            &scratch,
            &PassBindings {
                source: src,
                sampler: &self.sampler,
                uniforms: &horizontal_bind_group,
            },
            PassOptions::overwrite(EffectPhase::Blur),
        )?;
        self.pass.execute(
            device,
            ctx.encoder_mut(),
            &target,
            &PassBindings {
                source: &scratch,
                sampler: &self.sampler,
                uniforms: &vertical_bind_group,
            },
            PassOptions::overwrite(EffectPhase::Blur),
        )
    }

    fn ensure_scratch(&mut self, gpu: &GpuContext, src: &Texture) -> Result<Arc<Texture>> {
        if let Some(existing) = &self.scratch {
            if existing.matches(src.width(), src.height(), src.format()) {
                return Ok(Arc::clone(existing));
            }
        }
        let texture = Arc::new(Texture::create_2d(
            gpu,
            "Gaussian Blur Scratch",
            src.width(),
            src.height(),
            src.format(),
            crate::gpu::SHADER_RESOURCE_RENDER_TARGET,
        )?);
        self.scratch = Some(Arc::clone(&texture));
        Ok(texture)
    }
}
