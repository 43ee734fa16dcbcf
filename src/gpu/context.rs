//! Device ownership and headless initialization.

use crate::error::{EffectError, EffectPhase, Result};
use crate::gpu::render_context::Blitter;

/// Owns the wgpu adapter/device/queue used by every effect.
///
/// Effects borrow the context when they create resources; command recording
/// goes through a [`RenderContext`](crate::gpu::RenderContext) built on top
/// of it.
pub struct GpuContext {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    blitter: Blitter,
}

impl GpuContext {
    /// Creates a context without a surface.
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| EffectError::new(EffectPhase::GpuSetup, "no suitable GPU adapter found"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("glowpass device"),
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| EffectError::with_source(EffectPhase::GpuSetup, "failed to create device", e))?;

        Ok(Self::from_parts(adapter, device, queue))
    }

    /// Wraps handles created by a host renderer.
    pub fn from_parts(adapter: wgpu::Adapter, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let info = adapter.get_info();
        log::debug!("GPU context on {} ({:?})", info.name, info.backend);
        let blitter = Blitter::new(&device);
        Self {
            adapter,
            device,
            queue,
            blitter,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Human readable adapter description, e.g. `"llvmpipe (Vulkan)"`.
    pub fn adapter_name(&self) -> String {
        let info = self.adapter.get_info();
        format!("{} ({:?})", info.name, info.backend)
    }

    pub(crate) fn blitter(&self) -> &Blitter {
        &self.blitter
    }

    /// Whether effects can both sample from and render into `format`.
    pub fn supports_effect_format(&self, format: wgpu::TextureFormat) -> bool {
        let features = self.adapter.get_texture_format_features(format);
        features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
            && features.allowed_usages.contains(
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            )
    }

    pub(crate) fn ensure_effect_format(&self, format: wgpu::TextureFormat, phase: EffectPhase) -> Result<()> {
        if self.supports_effect_format(format) {
            Ok(())
        } else {
            Err(EffectError::new(
                phase,
                format!("texture format {:?} is not filterable and renderable on this adapter", format),
            ))
        }
    }
}
