//! Main engine orchestrator
//!
//! Owns the backend, the scene and the deferred render graph, and drives one
//! frame at a time: upload the scene, run the graph, present.

use crate::backend::traits::*;
use crate::backend::wgpu_backend::WgpuBackend;
use crate::pipeline::{build_deferred_graph, DeferredTargets, SceneResources};
use crate::render_graph::{CompiledGraph, GraphError, RenderGraph, RenderGraphExecutor};
use crate::resources::{TextureData, CHECKERBOARD_PNG};
use crate::scene::{InputEvent, SceneState};
use crate::DemoConfig;
use std::sync::Arc;
use thiserror::Error;
use winit::window::Window as WinitWindow;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Failed to decode asset `{name}`: {source}")]
    Asset {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// What happened to a frame handed to [`Engine::render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// The surface was lost or outdated; it has been reconfigured and the
    /// frame dropped
    Skipped,
}

/// The deferred light volume renderer
pub struct Engine<B: GraphicsBackend> {
    backend: B,
    scene: SceneState,
    resources: SceneResources,
    render_graph: RenderGraph<B>,
    compiled: CompiledGraph,
    graph_executor: RenderGraphExecutor,
    targets: DeferredTargets,
    width: u32,
    height: u32,
    frames: u64,
}

impl Engine<WgpuBackend> {
    /// Create the engine on a wgpu device for the given window
    pub fn new(window: Arc<WinitWindow>, config: &DemoConfig) -> EngineResult<Self> {
        let backend = WgpuBackend::new(window, config.vsync)?;
        let texture = TextureData::from_bytes(CHECKERBOARD_PNG, "checkerboard").map_err(|source| {
            EngineError::Asset {
                name: "checkerboard.png".into(),
                source,
            }
        })?;
        Self::from_backend(backend, &texture)
    }
}

impl<B: GraphicsBackend> Engine<B> {
    /// Build scene resources and the render graph on an initialized backend
    pub fn from_backend(mut backend: B, texture: &TextureData) -> EngineResult<Self> {
        let (width, height) = backend.surface_size();
        let scene = SceneState::new(width, height);
        let resources = SceneResources::create(&mut backend, &scene, texture)?;

        let (mut render_graph, targets) =
            build_deferred_graph::<B>(backend.swapchain_format(), &resources)?;
        let compiled = render_graph.compile()?;

        let mut graph_executor = RenderGraphExecutor::new();
        graph_executor.allocate_resources(&mut render_graph, &compiled, &mut backend, width, height)?;

        log::info!(
            "Deferred renderer ready: {} lights, {} passes, {}x{}",
            resources.light_count(),
            compiled.pass_order.len(),
            width,
            height
        );

        Ok(Self {
            backend,
            scene,
            resources,
            render_graph,
            compiled,
            graph_executor,
            targets,
            width,
            height,
            frames: 0,
        })
    }

    /// Handle window resize
    ///
    /// Every graph target is recreated at the new size. A zero-sized window
    /// (minimized) is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.backend.resize(width, height);

        // Get actual surface size (may be clamped by device limits)
        let (actual_width, actual_height) = self.backend.surface_size();
        if actual_width == self.width && actual_height == self.height {
            return Ok(());
        }

        self.width = actual_width;
        self.height = actual_height;
        self.scene.set_viewport_size(actual_width, actual_height);
        self.graph_executor.allocate_resources(
            &mut self.render_graph,
            &self.compiled,
            &mut self.backend,
            actual_width,
            actual_height,
        )?;
        log::debug!("Resized to {}x{}", actual_width, actual_height);
        Ok(())
    }

    /// Advance the scene by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        self.scene.update(dt);
    }

    pub fn apply_input(&mut self, event: InputEvent) {
        self.scene.apply_input(event);
    }

    /// Render and present one frame
    pub fn render(&mut self) -> EngineResult<FrameStatus> {
        let frame = match self.backend.begin_frame() {
            Ok(frame) => frame,
            Err(BackendError::SurfaceLost) => {
                self.recover_surface();
                return Ok(FrameStatus::Skipped);
            }
            Err(BackendError::AcquireImageFailed(reason)) => {
                log::warn!("Skipping frame: {}", reason);
                return Ok(FrameStatus::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        self.resources.write(&mut self.backend, &self.scene);
        self.graph_executor
            .set_external_view(self.targets.surface, frame.swapchain_view);
        self.graph_executor
            .execute(&mut self.render_graph, &self.compiled, &mut self.backend)?;

        match self.backend.end_frame() {
            Ok(()) => {}
            Err(BackendError::SurfaceLost) => {
                self.recover_surface();
                return Ok(FrameStatus::Skipped);
            }
            Err(e) => return Err(e.into()),
        }

        self.frames += 1;
        Ok(FrameStatus::Presented)
    }

    fn recover_surface(&mut self) {
        log::warn!("Surface lost or outdated, reconfiguring and skipping the frame");
        let (width, height) = self.backend.surface_size();
        self.backend.resize(width, height);
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    /// Current dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Frames presented so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn targets(&self) -> &DeferredTargets {
        &self.targets
    }

    pub fn graph_executor(&self) -> &RenderGraphExecutor {
        &self.graph_executor
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: GraphicsBackend> Drop for Engine<B> {
    fn drop(&mut self) {
        self.graph_executor.cleanup(&mut self.backend);
        self.resources.destroy(&mut self.backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Call, RecordingBackend};
    use crate::backend::types::TextureDescriptor;
    use crate::scene::CAMERA_SPEED;

    fn engine(width: u32, height: u32) -> Engine<RecordingBackend> {
        let texture = TextureData::checkerboard(8, 2, [255; 4], [0, 0, 0, 255]);
        Engine::from_backend(RecordingBackend::new(width, height), &texture).unwrap()
    }

    #[test]
    fn test_frame_uploads_before_first_pass() {
        let mut engine = engine(320, 200);
        engine.backend_mut().take_calls();
        assert_eq!(engine.render().unwrap(), FrameStatus::Presented);

        let calls = engine.backend_mut().take_calls();
        let first_write = calls
            .iter()
            .position(|c| matches!(c, Call::WriteBuffer(..)))
            .unwrap();
        let first_pass = calls
            .iter()
            .position(|c| matches!(c, Call::BeginRenderPass { .. }))
            .unwrap();
        assert!(first_write < first_pass);
        assert_eq!(calls.last(), Some(&Call::EndFrame));
        assert_eq!(engine.frame_count(), 1);
    }

    #[test]
    fn test_resize_reallocates_every_target() {
        let mut engine = engine(320, 200);
        engine.resize(640, 400).unwrap();

        assert_eq!(engine.dimensions(), (640, 400));
        assert_eq!(engine.scene().viewport(), (640, 400));
        let live = engine.backend().live_textures();
        let graph_targets: Vec<_> = live.iter().filter(|d| d.width == 640).collect();
        assert_eq!(graph_targets.len(), 5);
        assert!(live.iter().all(|d| d.width != 320));
    }

    #[test]
    fn test_lost_surface_skips_frame_and_reconfigures() {
        let mut engine = engine(320, 200);
        engine.backend_mut().take_calls();
        engine.backend_mut().lose_surface = true;

        assert_eq!(engine.render().unwrap(), FrameStatus::Skipped);
        let calls = engine.backend_mut().take_calls();
        assert_eq!(calls, vec![Call::Resize(320, 200)]);
        assert_eq!(engine.frame_count(), 0);

        assert_eq!(engine.render().unwrap(), FrameStatus::Presented);
    }

    #[test]
    fn test_repeated_resize_keeps_identical_targets() {
        let mut engine = engine(320, 200);
        engine.resize(640, 400).unwrap();
        let first: Vec<TextureDescriptor> =
            engine.backend().live_textures().into_iter().cloned().collect();

        engine.resize(640, 400).unwrap();
        let second: Vec<TextureDescriptor> =
            engine.backend().live_textures().into_iter().cloned().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_minimized_window_is_ignored() {
        let mut engine = engine(320, 200);
        engine.resize(0, 0).unwrap();
        assert_eq!(engine.dimensions(), (320, 200));
    }

    #[test]
    fn test_input_reaches_camera() {
        let mut engine = engine(320, 200);
        let start = engine.scene().camera.position;
        engine.apply_input(InputEvent::MoveBackward);
        assert!((engine.scene().camera.position.z - (start.z + CAMERA_SPEED)).abs() < 1e-6);
    }

    #[test]
    fn test_update_advances_clock() {
        let mut engine = engine(320, 200);
        engine.update(0.5);
        engine.update(0.25);
        assert!((engine.scene().time() - 0.75).abs() < 1e-6);
    }
}
