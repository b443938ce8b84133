//! Backend abstraction layer
//!
//! Provides the traits and types the render graph and passes are written
//! against, plus the wgpu implementation used at runtime.

pub mod shader;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

#[cfg(test)]
pub(crate) mod recording;

pub use traits::*;
pub use types::*;
