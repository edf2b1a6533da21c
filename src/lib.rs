// ============================================================================
// CRATE CONFIGURATION & IMPORTS
// ============================================================================

pub mod config;
pub mod drive;
pub mod error;
pub mod format;
pub mod input;
pub mod render;
pub mod state;
pub mod transmission;
pub mod viewport;

// External crate imports
use bon::Builder;
use pixels::{Pixels, SurfaceTexture};

// Standard library imports
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Window management imports
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

pub use config::{
    ChainConfig, Color, DriveConfig, FontConfig, LayoutConfig, Palette, ViewportConfig,
    WindowConfig,
};
pub use drive::{Mode, SpeedUnit};
pub use error::GearTrainError;
pub use state::{FrameView, GearTrainState, StageView};

use input::InputAdapter;
use render::Canvas;

// ============================================================================
// PUBLIC API - MAIN INTERFACE
// ============================================================================

/// Every way the outside world can change the gear train.
///
/// Commands are applied one at a time by [`GearTrainState::apply`], on the
/// thread that renders, so the driving value and the viewport offset are
/// never written concurrently.
#[derive(Debug, Clone, PartialEq)]
pub enum GearTrainCommand {
    DriveToggled,
    /// Absolute position of the manual control, in `[0, control_range]`.
    ManualPositionChanged(f64),
    ManualReleased,
    SpeedChanged(f64, SpeedUnit),
    /// Multiplies the current speed setting.
    ScaleSpeed(f64),
    ToggleSpeedUnit,
    ResetRequested,
    PanBy(f64),
    Wheel(f64),
    StepStages(f64),
    Page { forward: bool },
    ScrollHome,
    ScrollEnd,
    DragStarted(f64),
    DragMoved(f64),
    DragEnded,
    /// One-based stage number.
    JumpToStage(i64),
    CanvasResized(f64, f64), // width, height
    /// Elapsed milliseconds since the previous frame.
    FrameTick(f64),
}

#[derive(Debug, Clone, Builder)]
pub struct GearTrainConfig {
    #[builder(default)]
    pub chain: ChainConfig,
    #[builder(default)]
    pub layout: LayoutConfig,
    #[builder(default)]
    pub viewport: ViewportConfig,
    #[builder(default)]
    pub drive: DriveConfig,
    #[builder(default)]
    pub window: WindowConfig,
    #[builder(default)]
    pub font: FontConfig,
    #[builder(default)]
    pub palette: Palette,

    // Initial drive settings
    #[builder(default = 1.0)]
    pub speed: f64,
    #[builder(default)]
    pub speed_unit: SpeedUnit,
    #[builder(default = false)]
    pub auto_drive: bool,
    /// One-based stage to centre on at startup.
    #[builder(default = 1)]
    pub start_stage: i64,
}

impl Default for GearTrainConfig {
    fn default() -> Self {
        GearTrainConfig::builder().build()
    }
}

/// Main gear train struct - owns the configuration and runs the window
#[derive(Debug, Clone)]
pub struct GearTrain {
    config: GearTrainConfig,
}

impl GearTrain {
    pub fn new(config: GearTrainConfig) -> Result<Self, GearTrainError> {
        config.chain.validate()?;
        let ratio = config.chain.ratio();
        log::info!(
            "{} stages, {}:1 per stage, total ratio {}^{}",
            config.chain.stage_count,
            ratio,
            ratio,
            config.chain.stage_count
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &GearTrainConfig {
        &self.config
    }

    pub fn show(&self) -> Result<(), GearTrainError> {
        self.run_window(None)
    }

    /// Like [`GearTrain::show`], additionally applying every command that
    /// arrives on `receiver` at the start of each frame.
    pub fn show_with_commands(
        &self,
        receiver: Receiver<GearTrainCommand>,
    ) -> Result<(), GearTrainError> {
        self.run_window(Some(receiver))
    }

    fn run_window(&self, receiver: Option<Receiver<GearTrainCommand>>) -> Result<(), GearTrainError> {
        let window_config = &self.config.window;

        let event_loop = EventLoop::new()?;
        let window = WindowBuilder::new()
            .with_title(&window_config.title)
            .with_inner_size(initial_window_size(window_config))
            .build(&event_loop)?;

        let window = Arc::new(window);

        let font = match render::load_font(&self.config.font) {
            Ok(font) => Some(font),
            Err(err) => {
                log::warn!("{}; labels disabled", err);
                None
            }
        };

        let mut app_state = GearTrainState::new(&self.config)?;
        let mut input = InputAdapter::new(&self.config);

        let window_clone = window.clone();
        let size = window.inner_size();
        let mut fb_width = size.width.max(1);
        let mut fb_height = size.height.max(1);
        app_state.apply(GearTrainCommand::CanvasResized(
            fb_width as f64,
            fb_height as f64,
        ));
        input.set_canvas(fb_width as f64, fb_height as f64);
        let surface_texture = SurfaceTexture::new(fb_width, fb_height, &window);
        let mut pixels = Pixels::new(fb_width, fb_height, surface_texture)?;
        log::info!("window opened at {}x{}", fb_width, fb_height);

        let target_fps = window_config.max_framerate.max(1.0);
        let frame_duration = Duration::from_secs_f64(1.0 / target_fps);
        let mut last_frame = Instant::now();
        let mut clock = FrameClock::default();

        event_loop.run(move |event, window_target| {
            window_target.set_control_flow(ControlFlow::Poll);
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        log::info!("window closed");
                        window_target.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        if new_size.width == 0 || new_size.height == 0 {
                            return;
                        }
                        fb_width = new_size.width;
                        fb_height = new_size.height;
                        if let Err(err) = pixels.resize_buffer(fb_width, fb_height) {
                            log::error!("failed to resize pixel buffer: {}", err);
                        }
                        if let Err(err) = pixels.resize_surface(fb_width, fb_height) {
                            log::error!("failed to resize surface: {}", err);
                        }
                        app_state.apply(GearTrainCommand::CanvasResized(
                            fb_width as f64,
                            fb_height as f64,
                        ));
                        input.set_canvas(fb_width as f64, fb_height as f64);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state == ElementState::Pressed {
                            if let Some(command) = input.key_pressed(&event.logical_key) {
                                app_state.apply(command);
                            }
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        if let Some(command) = input.cursor_moved(position.x, position.y) {
                            app_state.apply(command);
                        }
                    }
                    WindowEvent::MouseInput {
                        state,
                        button: MouseButton::Left,
                        ..
                    } => {
                        if let Some(command) = input.primary_button(state == ElementState::Pressed)
                        {
                            app_state.apply(command);
                        }
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        if let Some(command) = input.wheel(delta) {
                            app_state.apply(command);
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        if let Some(ref receiver) = receiver {
                            app_state.drain(receiver);
                        }
                        app_state.advance(clock.lap(Instant::now()));

                        let view = app_state.frame();
                        let frame = pixels.frame_mut();
                        let mut canvas = Canvas::new(frame, fb_width as usize, fb_height as usize);
                        render::render_frame(
                            &mut canvas,
                            &view,
                            &self.config,
                            font.as_ref(),
                            input.pending_jump(),
                        );
                        if let Err(err) = pixels.render() {
                            log::error!("failed to render frame: {}", err);
                            window_target.exit();
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    if last_frame.elapsed() >= frame_duration {
                        window_clone.request_redraw();
                        last_frame = Instant::now();
                    }
                }
                _ => {}
            }
        })?;

        Ok(())
    }
}

/// Window size in physical pixels, the unit the layout is measured in.
fn initial_window_size(config: &WindowConfig) -> PhysicalSize<u32> {
    PhysicalSize::new((config.width as u32).max(1), (config.height as u32).max(1))
}

// ============================================================================
// FRAME TIMING
// ============================================================================

/// Measures the time between consecutive frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    /// Seconds since the previous lap. The first lap has nothing to measure
    /// against and returns 0.
    pub fn lap(&mut self, now: Instant) -> f64 {
        let elapsed = match self.last {
            Some(last) => now.saturating_duration_since(last).as_secs_f64(),
            None => 0.0,
        };
        self.last = Some(now);
        elapsed
    }
}
