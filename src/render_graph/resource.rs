//! Virtual resources for the render graph

use crate::backend::types::*;

/// Unique identifier for a render graph resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Virtual texture resource in the render graph
#[derive(Debug, Clone)]
pub struct VirtualTexture {
    pub id: ResourceId,
    pub name: String,
    pub size: TextureSize,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl VirtualTexture {
    /// Concrete descriptor for a given surface size
    pub fn descriptor(&self, screen_width: u32, screen_height: u32) -> TextureDescriptor {
        let (width, height) = self.size.resolve(screen_width, screen_height);
        TextureDescriptor {
            label: Some(self.name.clone()),
            width,
            height,
            format: self.format,
            usage: self.usage,
        }
    }
}

/// Resource type enumeration
#[derive(Debug, Clone)]
pub enum VirtualResource {
    Texture(VirtualTexture),
    /// External resource (like swapchain image)
    External { id: ResourceId, name: String },
}

impl VirtualResource {
    pub fn id(&self) -> ResourceId {
        match self {
            VirtualResource::Texture(t) => t.id,
            VirtualResource::External { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            VirtualResource::Texture(t) => &t.name,
            VirtualResource::External { name, .. } => name,
        }
    }
}

/// How a pass uses a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUsage {
    /// Read as a texture (sampled)
    TextureRead,
    /// Write as a render target
    RenderTarget,
    /// Depth/stencil attachment used only for tests
    DepthStencilRead,
    /// Depth/stencil attachment whose contents change
    DepthStencilWrite,
    /// Source of a texture copy
    CopySource,
    /// Destination of a texture copy
    CopyDestination,
}

/// Resource access declaration for a pass
#[derive(Debug, Clone)]
pub struct ResourceAccess {
    pub resource: ResourceId,
    pub usage: ResourceUsage,
}

impl ResourceAccess {
    pub fn is_read(&self) -> bool {
        matches!(
            self.usage,
            ResourceUsage::TextureRead | ResourceUsage::DepthStencilRead | ResourceUsage::CopySource
        )
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self.usage,
            ResourceUsage::RenderTarget
                | ResourceUsage::DepthStencilWrite
                | ResourceUsage::CopyDestination
        )
    }
}

/// Describes texture dimensions that can be relative to screen size
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureSize {
    /// Relative to screen size (1.0 = full screen)
    Relative { width_scale: f32, height_scale: f32 },
}

impl TextureSize {
    pub const FULL: Self = TextureSize::Relative {
        width_scale: 1.0,
        height_scale: 1.0,
    };

    /// Pixel size for a surface; never smaller than 1x1
    pub fn resolve(&self, screen_width: u32, screen_height: u32) -> (u32, u32) {
        let (width, height) = match self {
            TextureSize::Relative {
                width_scale,
                height_scale,
            } => (
                ((screen_width as f32) * width_scale) as u32,
                ((screen_height as f32) * height_scale) as u32,
            ),
        };
        (width.max(1), height.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_size_tracks_screen() {
        assert_eq!(TextureSize::FULL.resolve(1280, 720), (1280, 720));
        let half = TextureSize::Relative {
            width_scale: 0.5,
            height_scale: 0.5,
        };
        assert_eq!(half.resolve(1280, 720), (640, 360));
        assert_eq!(half.resolve(1, 1), (1, 1));
    }

    #[test]
    fn test_access_classification() {
        let sampled = ResourceAccess {
            resource: ResourceId(0),
            usage: ResourceUsage::TextureRead,
        };
        let target = ResourceAccess {
            resource: ResourceId(0),
            usage: ResourceUsage::DepthStencilWrite,
        };
        assert!(sampled.is_read() && !sampled.is_write());
        assert!(target.is_write() && !target.is_read());
    }
}
