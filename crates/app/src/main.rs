//! vista: interactive glTF scene viewer.
//!
//! Loads the scene named by the config, then renders it with a free-flying
//! camera until Escape or the window is closed.

use anyhow::Result;
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use vista_core::{FixedStep, Timer, ViewerConfig};
use vista_platform::{InputState, ViewerActions, Window};
use vista_renderer::Renderer;

/// Interval between frame-rate log lines.
const STATS_INTERVAL_SECS: f32 = 5.0;

struct App {
    config: ViewerConfig,
    // Dropped before the window it renders into.
    renderer: Option<Renderer>,
    window: Option<Window>,
    input: InputState,
    clock: FixedStep,
    timer: Timer,
    frames_since_stats: u32,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        let clock = FixedStep::new(config.simulation.fixed_timestep);
        Self {
            config,
            renderer: None,
            window: None,
            input: InputState::new(),
            clock,
            timer: Timer::new(),
            frames_since_stats: 0,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(
            event_loop,
            self.config.window.width,
            self.config.window.height,
            &self.config.window.title,
        )?;
        let renderer = Renderer::new(&window, &self.config)?;
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    /// One loop iteration: sample input once, step the camera, draw.
    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        let actions = ViewerActions::from_input(&self.input);
        if actions.quit {
            info!("Escape pressed, shutting down");
            event_loop.exit();
            return;
        }

        renderer.update(&actions, self.clock.next());
        if self.window.as_ref().is_some_and(Window::is_minimized) {
            self.input.begin_frame();
            return;
        }
        if let Err(e) = renderer.render_frame() {
            error!("Render error: {}", e);
            event_loop.exit();
            return;
        }
        self.input.begin_frame();

        self.frames_since_stats += 1;
        let elapsed = self.timer.elapsed_secs();
        if elapsed >= STATS_INTERVAL_SECS {
            info!(
                "{:.1} fps ({} frames)",
                self.frames_since_stats as f32 / elapsed,
                self.clock.steps_taken()
            );
            self.frames_since_stats = 0;
            self.timer.reset();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(()) => info!("Initialization complete, entering main loop"),
            Err(e) => {
                error!("Initialization failed: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            WindowEvent::Focused(focused) => {
                self.input.on_focus_changed(focused);
                if focused {
                    if let Some(window) = self.window.as_ref() {
                        window.capture_cursor();
                    }
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.input.on_mouse_motion(dx, dy);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let config = ViewerConfig::from_env_or_args()?;
    vista_core::init_logging_with(config.log_filter.as_deref());
    debug!("Effective configuration:\n{}", config.to_toml_string()?);
    info!("Starting vista ({:?})", config.scene.path);

    let event_loop = EventLoop::new()?;
    // Busy loop: a minimized window keeps polling events until it is restored.
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}
