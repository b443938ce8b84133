//! Texture loading and upload

use crate::backend::traits::*;
use crate::backend::types::*;
use image::{DynamicImage, GenericImageView};

/// The scene texture, bundled with the binary
pub const CHECKERBOARD_PNG: &[u8] = include_bytes!("../../assets/checkerboard.png");

/// Decoded RGBA8 texture data
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Decode an encoded image (PNG)
    pub fn from_bytes(bytes: &[u8], name: &str) -> image::ImageResult<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_image(img, name))
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        let data = img.to_rgba8().into_raw();

        Self {
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            data,
            name: name.to_string(),
        }
    }

    /// Create a checkerboard texture with `square`-pixel cells
    pub fn checkerboard(size: u32, square: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let square = square.max(1);
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / square) + (y / square)) % 2 == 0;
                let color = if is_even { color1 } else { color2 };
                data.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            format: TextureFormat::Rgba8Unorm,
            data,
            name: "checkerboard".to_string(),
        }
    }

    /// RGBA8 texel at integer coordinates, wrapping like a repeat sampler
    pub fn texel(&self, x: i64, y: i64) -> [u8; 4] {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        let offset = (y * self.width as usize + x) * 4;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }
}

/// GPU texture with its default view
pub struct GpuTexture {
    pub handle: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl GpuTexture {
    /// Create and upload texture to GPU
    pub fn create<B: GraphicsBackend>(backend: &mut B, data: &TextureData) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            format: data.format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;

        let view = backend.create_texture_view(handle)?;
        backend.write_texture(handle, &data.data, data.width, data.height);

        Ok(Self {
            handle,
            view,
            width: data.width,
            height: data.height,
            format: data.format,
        })
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.destroy_texture_view(self.view);
        backend.destroy_texture(self.handle);
    }
}
