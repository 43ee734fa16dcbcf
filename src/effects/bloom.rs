//! Bloom post effect.
//!
//! Bright regions of the frame are extracted at reduced resolution, blurred
//! and added back on top of the frame:
//! 1. Blit the frame into a low-res texture
//! 2. High-pass filter on luminance
//! 3. Separable Gaussian blur, in place
//! 4. Additive composite over the frame's color target 0

use std::sync::Arc;

use crate::effects::gaussian_blur::GaussianBlur;
use crate::effects::pass_filter::{PassFilter, PassFilterType};
use crate::error::{EffectError, EffectPhase, Result};
use crate::gpu::render_context::{SrcRectUniforms, BLIT_SHADER};
use crate::gpu::{states, Fbo, FullScreenPass, GpuContext, PassBindings, PassOptions, RenderContext, Texture};
use crate::job::BloomSettings;
use crate::params::{EffectParamKind, BLOOM_PARAMS};
use crate::ui::ParamUi;

/// Shortest side of the low-res working texture, in texels.
pub const MIN_LOW_RES_HEIGHT: u32 = 256;

/// Downscale factor between the frame and the low-res working texture.
pub const LOW_RES_DIVISOR: u32 = 4;

/// Size of the low-res working texture for a `width` x `height` frame.
///
/// A quarter of the frame, but never shorter than 256 texels and never
/// narrower than what 256 texels of height would need at the frame's aspect.
pub fn low_res_size(width: u32, height: u32) -> (u32, u32) {
    let h = (height / LOW_RES_DIVISOR).max(MIN_LOW_RES_HEIGHT);
    let aspect = width as f32 / height.max(1) as f32;
    let w = (width / LOW_RES_DIVISOR).max((MIN_LOW_RES_HEIGHT as f32 * aspect) as u32);
    (w.max(1), h)
}

pub struct Bloom {
    filter: PassFilter,
    blur: GaussianBlur,
    composite: FullScreenPass,
    composite_blend: wgpu::BlendState,
    composite_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    filter_result_fbo: Fbo,
    low_res: Option<Arc<Texture>>,
}

impl Bloom {
    pub fn new(gpu: &GpuContext, threshold: f32, kernel_width: u32, sigma: f32) -> Self {
        let device = gpu.device();
        let composite = FullScreenPass::new(device, "Bloom Composite", BLIT_SHADER);
        let composite_bind_group = composite.uniform_bind_group(device, "Bloom SrcRect", &SrcRectUniforms::full());

        Self {
            filter: PassFilter::new(gpu, PassFilterType::HighPass, threshold),
            blur: GaussianBlur::new(gpu, kernel_width, sigma),
            composite,
            composite_blend: states::additive_blend(),
            composite_bind_group,
            sampler: states::linear_clamp_sampler(device, "Bloom Sampler"),
            filter_result_fbo: Fbo::new(),
            low_res: None,
        }
    }

    pub fn from_settings(gpu: &GpuContext, settings: &BloomSettings) -> Self {
        let s = settings.sanitize();
        Self::new(gpu, s.threshold, s.kernel_width, s.sigma)
    }

    pub fn settings(&self) -> BloomSettings {
        BloomSettings {
            threshold: self.filter.threshold(),
            kernel_width: self.blur.kernel_width(),
            sigma: self.blur.sigma(),
        }
    }

    pub fn apply_settings(&mut self, settings: &BloomSettings) {
        let s = settings.sanitize();
        self.filter.set_threshold(s.threshold);
        self.blur.set_kernel_width(s.kernel_width);
        self.blur.set_sigma(s.sigma);
    }

    pub fn threshold(&self) -> f32 {
        self.filter.threshold()
    }

    pub fn blur(&self) -> &GaussianBlur {
        &self.blur
    }

    /// The low-res working texture from the last `execute`, if any.
    pub fn low_res_texture(&self) -> Option<&Arc<Texture>> {
        self.low_res.as_ref()
    }

    /// (Re)creates the low-res texture when `source`'s size or format
    /// no longer matches it.
    pub fn update_low_res_texture(&mut self, gpu: &GpuContext, source: &Texture) -> Result<()> {
        let (w, h) = low_res_size(source.width(), source.height());
        if let Some(existing) = &self.low_res {
            if existing.matches(w, h, source.format()) {
                return Ok(());
            }
        }
        log::debug!(
            "Bloom low-res texture {}x{} {:?} for {}x{} source",
            w,
            h,
            source.format(),
            source.width(),
            source.height()
        );
        let texture = Texture::create_2d(
            gpu,
            "Bloom Low-Res",
            w,
            h,
            source.format(),
            crate::gpu::SHADER_RESOURCE_RENDER_TARGET,
        )?;
        self.low_res = Some(Arc::new(texture));
        Ok(())
    }

    /// Records the bloom passes onto `fbo`'s color target 0.
    ///
    /// The target's existing contents are kept; the blurred highlights are
    /// added on top.
    pub fn execute(&mut self, ctx: &mut RenderContext<'_>, fbo: &Fbo) -> Result<()> {
        let frame = fbo
            .color_texture(0)
            .ok_or_else(|| EffectError::new(EffectPhase::Composite, "bloom target FBO has no color target 0"))?
            .clone();
        let gpu = ctx.gpu();
        gpu.ensure_effect_format(frame.format(), EffectPhase::Composite)?;

        self.update_low_res_texture(gpu, &frame)?;
        let low_res = match &self.low_res {
            Some(texture) => Arc::clone(texture),
            None => {
                return Err(EffectError::new(EffectPhase::ResourceCreation, "low-res texture missing"));
            }
        };

        ctx.blit(&frame, &low_res)?;

        let filtered = self.filter.execute(ctx, &low_res)?;
        self.filter_result_fbo.attach_color_target(Arc::clone(&filtered), 0)?;

        self.blur.execute(ctx, &filtered, &self.filter_result_fbo)?;

        let device = ctx.device();
        self.composite.execute(
            device,
            ctx.encoder_mut(),
            &frame,
            &PassBindings {
                source: &filtered,
                sampler: &self.sampler,
                uniforms: &self.composite_bind_group,
            },
            PassOptions::blend_over(self.composite_blend, EffectPhase::Composite),
        )
    }

    /// Draws the bloom controls and applies any edits.
    ///
    /// With `group` set the controls sit inside a collapsible group and are
    /// skipped while it is collapsed.
    pub fn render_ui(&mut self, ui: &mut dyn ParamUi, group: Option<&str>) {
        let mut settings = self.settings();
        if edit_settings(ui, &mut settings, group) {
            self.apply_settings(&settings);
        }
    }
}

/// Emits the bloom widgets for `settings`. Returns true if any value changed.
pub fn edit_settings(ui: &mut dyn ParamUi, settings: &mut BloomSettings, group: Option<&str>) -> bool {
    if let Some(label) = group {
        if !ui.begin_group(label) {
            return false;
        }
    }

    let mut changed = false;
    for def in BLOOM_PARAMS.iter() {
        match def.kind {
            EffectParamKind::Float => {
                let Some(value) = settings.float_param_mut(def.name) else {
                    continue;
                };
                changed |= ui.add_float_var(def.label, value, def.min.unwrap_or(f32::MIN));
            }
            EffectParamKind::Int => {
                let Some(mut value) = settings.int_param(def.name) else {
                    continue;
                };
                if ui.add_int_var(def.label, &mut value, def.min_i32(), def.max_i32(), def.step.unwrap_or(1)) {
                    settings.set_int_param(def.name, value);
                    changed = true;
                }
            }
        }
    }

    if group.is_some() {
        ui.end_group();
    }
    changed
}
