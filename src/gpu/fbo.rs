//! Frame buffer objects: a set of color targets bound together as a draw destination.

use std::sync::Arc;

use crate::error::{EffectError, EffectPhase, Result};
use crate::gpu::Texture;

/// Maximum number of simultaneously bound color targets.
pub const MAX_COLOR_TARGETS: usize = 8;

#[derive(Debug, Default, Clone)]
pub struct Fbo {
    color_targets: [Option<Arc<Texture>>; MAX_COLOR_TARGETS],
}

impl Fbo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an FBO with `texture` bound at slot 0.
    pub fn with_color(texture: Arc<Texture>) -> Result<Self> {
        let mut fbo = Self::new();
        fbo.attach_color_target(texture, 0)?;
        Ok(fbo)
    }

    /// Binds `texture` at `index`, replacing whatever was there.
    pub fn attach_color_target(&mut self, texture: Arc<Texture>, index: usize) -> Result<()> {
        if index >= MAX_COLOR_TARGETS {
            return Err(EffectError::new(
                EffectPhase::ResourceCreation,
                format!("color target index {} out of range (max {})", index, MAX_COLOR_TARGETS - 1),
            ));
        }
        if !texture.has_usage(wgpu::TextureUsages::RENDER_ATTACHMENT) {
            return Err(EffectError::new(
                EffectPhase::ResourceCreation,
                format!("texture bound at color target {} is not a render attachment", index),
            ));
        }
        self.color_targets[index] = Some(texture);
        Ok(())
    }

    pub fn detach_color_target(&mut self, index: usize) -> Option<Arc<Texture>> {
        self.color_targets.get_mut(index).and_then(Option::take)
    }

    pub fn color_texture(&self, index: usize) -> Option<&Arc<Texture>> {
        self.color_targets.get(index).and_then(Option::as_ref)
    }

    pub fn width(&self) -> Option<u32> {
        self.color_texture(0).map(|t| t.width())
    }

    pub fn height(&self) -> Option<u32> {
        self.color_texture(0).map(|t| t.height())
    }

    /// Number of occupied color slots.
    pub fn color_target_count(&self) -> usize {
        self.color_targets.iter().filter(|t| t.is_some()).count()
    }
}
