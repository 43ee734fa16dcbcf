//! GPU → CPU texture readback.

use crate::error::{EffectError, EffectPhase, Result};
use crate::gpu::{GpuContext, Texture};

/// Row pitch required by `copy_texture_to_buffer`.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padding = (align - unpadded % align) % align;
    unpadded + padding
}

/// Reads an 8-bit RGBA-style texture back as tightly packed rows.
///
/// Blocks until the GPU has finished all previously submitted work.
pub fn read_rgba8(gpu: &GpuContext, texture: &Texture) -> Result<Vec<u8>> {
    if !texture.has_usage(wgpu::TextureUsages::COPY_SRC) {
        return Err(EffectError::new(EffectPhase::Readback, "texture was not created with COPY_SRC"));
    }
    if texture.format().block_copy_size(None) != Some(4) {
        return Err(EffectError::new(
            EffectPhase::Readback,
            format!("{:?} is not a 4-byte texel format", texture.format()),
        ));
    }

    let width = texture.width();
    let height = texture.height();
    let padded = padded_bytes_per_row(width);

    let output_buffer = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: (padded * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: texture.raw(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &output_buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        texture.raw().size(),
    );
    gpu.queue().submit(Some(encoder.finish()));

    let buffer_slice = output_buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
        let _ = tx.send(v);
    });
    gpu.device().poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| EffectError::with_source(EffectPhase::Readback, "map callback dropped", e))?
        .map_err(|e| EffectError::with_source(EffectPhase::Readback, "failed to map readback buffer", e))?;

    let data = buffer_slice.get_mapped_range();
    let row_bytes = (width * 4) as usize;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height {
        let start = (row * padded) as usize;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    drop(data);
    output_buffer.unmap();

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_row_alignment() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(800) % 256, 0);
        assert!(padded_bytes_per_row(800) >= 3200);
    }
}
