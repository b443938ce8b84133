//! Window management using winit

use crate::engine::{Engine, EngineError, FrameStatus};
use crate::scene::InputEvent;
use crate::DemoConfig;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use winit::{
    dpi::PhysicalSize,
    error::{EventLoopError, OsError},
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window as WinitWindow, WindowBuilder},
};

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Event loop error: {0}")]
    EventLoop(#[from] EventLoopError),
    #[error("Failed to create window: {0}")]
    Os(#[from] OsError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Wrapper around winit window with additional state
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    resized: bool,
    close_requested: bool,
    pending_input: Vec<InputEvent>,
}

/// Camera movement bound to a physical key
pub fn key_to_input(key: KeyCode) -> Option<InputEvent> {
    match key {
        KeyCode::KeyW => Some(InputEvent::MoveForward),
        KeyCode::KeyS => Some(InputEvent::MoveBackward),
        KeyCode::KeyA => Some(InputEvent::MoveLeft),
        KeyCode::KeyD => Some(InputEvent::MoveRight),
        _ => None,
    }
}

impl Window {
    /// Create a new window with the given title and dimensions
    pub fn new(
        event_loop: &EventLoop<()>,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, OsError> {
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height))
                .build(event_loop)?,
        );

        Ok(Self {
            window,
            width,
            height,
            resized: false,
            close_requested: false,
            pending_input: Vec::new(),
        })
    }

    /// Get arc reference to window
    pub fn window_arc(&self) -> Arc<WinitWindow> {
        Arc::clone(&self.window)
    }

    /// Get current window dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns whether the window was resized since the last call
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    /// Check if close was requested
    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Input events gathered since the last call, in arrival order
    pub fn drain_input(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.pending_input)
    }

    /// Handle window events
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.width = size.width;
                self.height = size.height;
                self.resized = true;
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if *code == KeyCode::Escape {
                    self.close_requested = true;
                } else if let Some(input) = key_to_input(*code) {
                    self.pending_input.push(input);
                }
            }
            _ => {}
        }
    }

    /// Request a redraw
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

/// Open the demo window and render until it is closed
///
/// Fatal engine errors stop the loop and are returned once it has exited.
pub fn run(config: DemoConfig) -> Result<(), WindowError> {
    let event_loop = EventLoop::new()?;
    let mut window = Window::new(&event_loop, &config.title, config.width, config.height)?;
    let mut engine = Engine::new(window.window_arc(), &config)?;

    let mut last_frame = Instant::now();
    let mut failure: Option<EngineError> = None;

    event_loop.run(|event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => {
                window.handle_event(&event);
                if window.should_close() {
                    elwt.exit();
                    return;
                }

                let result = match event {
                    WindowEvent::Resized(_) if window.take_resized() => {
                        let (width, height) = window.dimensions();
                        engine.resize(width, height)
                    }
                    WindowEvent::RedrawRequested => {
                        for input in window.drain_input() {
                            engine.apply_input(input);
                        }

                        let now = Instant::now();
                        let dt = (now - last_frame).as_secs_f32();
                        last_frame = now;
                        engine.update(dt);

                        engine.render().map(|status| {
                            if status == FrameStatus::Skipped {
                                log::debug!("Frame {} skipped", engine.frame_count());
                            }
                        })
                    }
                    _ => Ok(()),
                };

                if let Err(e) = result {
                    failure = Some(e);
                    elwt.exit();
                }
            }
            Event::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
