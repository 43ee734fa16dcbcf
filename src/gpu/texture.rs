//! 2D texture resources with a default view.

use crate::error::{EffectError, EffectPhase, Result};
use crate::gpu::GpuContext;

/// Usage flags for textures that are both sampled and rendered into.
pub const SHADER_RESOURCE_RENDER_TARGET: wgpu::TextureUsages =
    wgpu::TextureUsages::TEXTURE_BINDING.union(wgpu::TextureUsages::RENDER_ATTACHMENT);

/// Single-mip, single-sample 2D texture.
#[derive(Debug)]
pub struct Texture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl Texture {
    /// Creates an uninitialized 2D texture.
    pub fn create_2d(
        gpu: &GpuContext,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Result<Self> {
        let max_dim = gpu.device().limits().max_texture_dimension_2d;
        if width == 0 || height == 0 {
            return Err(EffectError::new(
                EffectPhase::ResourceCreation,
                format!("{}: texture size {}x{} is empty", label, width, height),
            ));
        }
        if width > max_dim || height > max_dim {
            return Err(EffectError::new(
                EffectPhase::ResourceCreation,
                format!(
                    "{}: texture size {}x{} exceeds device limit {}",
                    label, width, height, max_dim
                ),
            ));
        }

        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
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
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("created texture '{}' {}x{} {:?}", label, width, height, format);

        Ok(Self { texture, view })
    }

    /// Creates a texture and fills it with tightly packed RGBA8 pixels.
    ///
    /// `COPY_DST` is added to `usage` for the upload.
    pub fn from_rgba8(
        gpu: &GpuContext,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        pixels: &[u8],
    ) -> Result<Self> {
        if format.block_copy_size(None) != Some(4) {
            return Err(EffectError::new(
                EffectPhase::ResourceCreation,
                format!("{}: {:?} is not a 4-byte texel format", label, format),
            ));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(EffectError::new(
                EffectPhase::ResourceCreation,
                format!(
                    "{}: expected {} bytes of RGBA8 data, got {}",
                    label,
                    expected,
                    pixels.len()
                ),
            ));
        }

        let texture = Self::create_2d(gpu, label, width, height, format, usage | wgpu::TextureUsages::COPY_DST)?;
        gpu.queue().write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            texture.texture.size(),
        );
        Ok(texture)
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    pub fn usage(&self) -> wgpu::TextureUsages {
        self.texture.usage()
    }

    pub fn has_usage(&self, usage: wgpu::TextureUsages) -> bool {
        self.usage().contains(usage)
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn raw(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// True when a texture of the given shape would be identical in size and format.
    pub fn matches(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> bool {
        self.width() == width && self.height() == height && self.format() == format
    }
}
