use std::sync::atomic::{AtomicU64, Ordering};

use image::imageops::FilterType;
use tracing::debug;

use crate::events::DecodedImage;
use crate::frame::Release;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// An sRGB RGBA8 texture uploaded from a decoded image.
#[derive(Debug)]
pub struct GpuTexture {
    id: u64,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl GpuTexture {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            texture,
            view,
        }
    }

    /// Uploads a decoded image, shrinking it first if it exceeds `max_dim`.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &DecodedImage,
        max_dim: u32,
    ) -> Self {
        if let Some((width, height, pixels)) = shrink_to_limit(image, max_dim) {
            debug!(
                from_width = image.width,
                from_height = image.height,
                width,
                height,
                "texture_downscaled_to_device_limit"
            );
            return Self::from_rgba(device, queue, "frame-image", width, height, &pixels);
        }
        Self::from_rgba(
            device,
            queue,
            "frame-image",
            image.width,
            image.height,
            &image.pixels,
        )
    }

    /// Opaque white 1x1 texture bound where a material has no map.
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::from_rgba(device, queue, "frame-placeholder", 1, 1, &[255; 4])
    }
}

impl Release for GpuTexture {
    fn release(self) {
        debug!(id = self.id, "texture_released");
        self.texture.destroy();
    }
}

pub(crate) fn fit_within(width: u32, height: u32, max_dim: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dim || max_dim == 0 {
        return None;
    }
    let scale = max_dim as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_dim);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_dim);
    Some((w, h))
}

fn shrink_to_limit(image: &DecodedImage, max_dim: u32) -> Option<(u32, u32, Vec<u8>)> {
    let (width, height) = fit_within(image.width, image.height, max_dim)?;
    let source = image::RgbaImage::from_raw(image.width, image.height, image.pixels.clone())?;
    let resized = image::imageops::resize(&source, width, height, FilterType::Triangle);
    Some((width, height, resized.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_within_limit_are_untouched() {
        assert_eq!(fit_within(2048, 1024, 4096), None);
        assert_eq!(fit_within(4096, 4096, 4096), None);
    }

    #[test]
    fn oversized_images_keep_their_aspect() {
        assert_eq!(fit_within(8000, 4000, 2048), Some((2048, 1024)));
        assert_eq!(fit_within(100, 9000, 2048), Some((23, 2048)));
    }

    #[test]
    fn shrinking_preserves_pixel_buffer_shape() {
        let image = DecodedImage {
            width: 8,
            height: 4,
            pixels: vec![128; 8 * 4 * 4],
        };
        let (w, h, pixels) = shrink_to_limit(&image, 4).unwrap();
        assert_eq!((w, h), (4, 2));
        assert_eq!(pixels.len(), 4 * 2 * 4);
    }
}
