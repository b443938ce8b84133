//! Deferred Light Volumes - a render graph-based deferred renderer for point lights
//!
//! A textured sphere is rendered into a G-buffer, each point light's bounding
//! sphere marks the pixels it can reach in the stencil buffer, and the marked
//! pixels are shaded additively, one light at a time.
//!
//! # Features
//! - Render graph system ordering passes from their declared resource accesses
//! - Stencil-culled light volumes with additive accumulation
//! - wgpu backend with WGSL shaders validated through naga before pipeline creation
//! - CPU reference model of the per-pixel stencil and shading results

pub mod backend;
pub mod engine;
pub mod pipeline;
pub mod render_graph;
pub mod resources;
pub mod scene;
pub mod window;

pub use engine::{Engine, EngineError, EngineResult, FrameStatus};
pub use window::Window;

// Re-export wgpu backend for direct access
pub use backend::wgpu_backend::WgpuBackend;

/// Configuration for the demo window and renderer
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "Deferred Light Volumes".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}
