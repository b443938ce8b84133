//! Resource management
//!
//! CPU-side meshes and textures and their GPU uploads.

mod mesh;
mod texture;

pub use mesh::*;
pub use texture::*;
