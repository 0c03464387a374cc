//! Interactive glTF model viewer - main entry point.
//!
//! Arrow keys orbit the camera, W/S zoom, and A/D/Q/E pan the orbit target.
//! The model path comes from the first command line argument.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use viewer_core::Timer;
use viewer_platform::{InputState, KeyCode, Window};
use viewer_renderer::Renderer;
use viewer_scene::OrbitCamera;

/// Default model path when no argument is given.
const DEFAULT_MODEL: &str = "assets/model.glb";

/// Directory holding the compiled SPIR-V shaders.
const SHADER_DIR: &str = "shaders/spirv";

/// Camera input steps applied per second of key hold.
const CAMERA_STEPS_PER_SEC: f32 = 120.0;

struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    camera: OrbitCamera,
    input: InputState,
    timer: Timer,
    model_path: PathBuf,
}

impl App {
    fn new(model_path: PathBuf) -> Self {
        Self {
            window: None,
            renderer: None,
            camera: OrbitCamera::default(),
            input: InputState::new(),
            timer: Timer::new(),
            model_path,
        }
    }

    /// Applies one frame of keyboard camera control, scaled by frame time.
    fn update_camera(&mut self, delta: f32) {
        let scale = delta * CAMERA_STEPS_PER_SEC;
        let step = |neg: KeyCode, pos: KeyCode| -> f32 {
            let mut v = 0.0;
            if self.input.is_key_pressed(pos) {
                v += scale;
            }
            if self.input.is_key_pressed(neg) {
                v -= scale;
            }
            v
        };

        let yaw = step(KeyCode::ArrowLeft, KeyCode::ArrowRight);
        let pitch = step(KeyCode::ArrowDown, KeyCode::ArrowUp);
        if yaw != 0.0 || pitch != 0.0 {
            self.camera.orbit(yaw, pitch);
        }

        let zoom = step(KeyCode::KeyS, KeyCode::KeyW);
        if zoom != 0.0 {
            self.camera.zoom(zoom);
        }

        let right = step(KeyCode::KeyA, KeyCode::KeyD);
        let up = step(KeyCode::KeyE, KeyCode::KeyQ);
        if right != 0.0 || up != 0.0 {
            self.camera.pan(right, up);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window = match Window::new(event_loop, 800, 600, "Model Viewer") {
                Ok(window) => window,
                Err(e) => {
                    error!("Failed to create window: {}", e);
                    event_loop.exit();
                    return;
                }
            };

            let mut renderer = match Renderer::new(&window, SHADER_DIR.as_ref()) {
                Ok(renderer) => renderer,
                Err(e) => {
                    error!("Failed to create renderer: {}", e);
                    event_loop.exit();
                    return;
                }
            };

            if let Err(e) = renderer.load_model(&self.model_path) {
                error!("Failed to load {}: {}", self.model_path.display(), e);
                event_loop.exit();
                return;
            }

            info!("Initialization complete, entering main loop");
            self.renderer = Some(renderer);
            self.window = Some(window);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                }
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let delta = self.timer.delta_secs();
                self.update_camera(delta);

                if let Some(ref mut renderer) = self.renderer {
                    if let Err(e) = renderer.render_frame(&self.camera) {
                        error!("Render error: {}", e);
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::PhysicalKey;
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.input.begin_frame();
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    viewer_core::init_logging();

    let model_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL));

    info!("Starting model viewer with {}", model_path.display());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(model_path);
    event_loop.run_app(&mut app)?;

    Ok(())
}
