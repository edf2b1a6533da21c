//! The single owner of everything that changes between frames.
//!
//! Input handlers and the frame loop both go through [`GearTrainState`], so
//! the driving value and the viewport offset each have exactly one writer.

use std::sync::mpsc::Receiver;

use crate::drive::{Drive, Mode};
use crate::error::GearTrainError;
use crate::format::{format_control, format_rotations};
use crate::transmission::Transmission;
use crate::viewport::Viewport;
use crate::{GearTrainCommand, GearTrainConfig};

/// What the renderer needs to draw one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageView {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub is_top_row: bool,
    pub rotation_text: String,
    pub stage_label: String,
}

/// Everything one frame shows, computed after input and timing are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameView {
    pub stages: Vec<StageView>,
    /// Axle of the stage just past the visible range, if the chain goes on.
    pub next_stage: Option<(f64, f64)>,
    pub offset: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub first_visible: usize,
    pub last_visible: usize,
    pub driving_summary: String,
    pub control_position: f64,
    pub control_range: f64,
    pub mode: Mode,
    pub speed_per_second: f64,
}

#[derive(Debug, Clone)]
pub struct GearTrainState {
    transmission: Transmission,
    drive: Drive,
    viewport: Viewport,
}

impl GearTrainState {
    pub fn new(config: &GearTrainConfig) -> Result<Self, GearTrainError> {
        let transmission = Transmission::new(&config.chain, config.layout.clone())?;
        let mut viewport = Viewport::new(
            config.viewport.clone(),
            &config.layout,
            transmission.stage_count(),
            config.window.width as f64,
            config.window.height as f64,
        );
        let mut drive = Drive::new(config.drive.clone());
        drive.set_speed(config.speed, config.speed_unit);
        if config.auto_drive {
            drive.toggle_drive();
        }
        if config.start_stage > 1 {
            viewport.jump_to_stage(config.start_stage);
        }
        Ok(Self {
            transmission,
            drive,
            viewport,
        })
    }

    pub fn transmission(&self) -> &Transmission {
        &self.transmission
    }

    pub fn drive(&self) -> &Drive {
        &self.drive
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn apply(&mut self, command: GearTrainCommand) {
        match command {
            GearTrainCommand::DriveToggled => self.drive.toggle_drive(),
            GearTrainCommand::ManualPositionChanged(position) => {
                self.drive.apply_manual_delta(position)
            }
            GearTrainCommand::ManualReleased => self.drive.release_manual(),
            GearTrainCommand::SpeedChanged(value, unit) => self.drive.set_speed(value, unit),
            GearTrainCommand::ScaleSpeed(factor) => self.drive.scale_speed(factor),
            GearTrainCommand::ToggleSpeedUnit => self.drive.toggle_speed_unit(),
            GearTrainCommand::ResetRequested => self.drive.reset(),
            GearTrainCommand::PanBy(delta) => self.viewport.pan_by(delta),
            GearTrainCommand::Wheel(delta) => self.viewport.wheel(delta),
            GearTrainCommand::StepStages(stages) => self.viewport.step(stages),
            GearTrainCommand::Page { forward } => self.viewport.page(forward),
            GearTrainCommand::ScrollHome => self.viewport.scroll_home(),
            GearTrainCommand::ScrollEnd => self.viewport.scroll_end(),
            GearTrainCommand::DragStarted(x) => self.viewport.begin_drag(x),
            GearTrainCommand::DragMoved(x) => self.viewport.drag_to(x),
            GearTrainCommand::DragEnded => self.viewport.end_drag(),
            GearTrainCommand::JumpToStage(stage) => {
                self.viewport.jump_to_stage(stage);
            }
            GearTrainCommand::CanvasResized(width, height) => {
                self.viewport.set_canvas_size(width, height)
            }
            GearTrainCommand::FrameTick(elapsed_ms) => self.advance(elapsed_ms / 1000.0),
        }
    }

    /// Applies every queued command without blocking.
    pub fn drain(&mut self, receiver: &Receiver<GearTrainCommand>) {
        while let Ok(command) = receiver.try_recv() {
            self.apply(command);
        }
    }

    /// Runs one frame of continuous drive.
    pub fn advance(&mut self, elapsed_seconds: f64) {
        self.drive.tick(elapsed_seconds);
    }

    pub fn frame(&self) -> FrameView {
        let driving = self.drive.driving_value();
        let range = self.viewport.visible_range();
        let next_stage = (range.end < self.transmission.stage_count()).then(|| {
            let position = self.transmission.stage_position(range.end);
            (position.x, position.y)
        });
        let stages = range
            .map(|index| {
                let position = self.transmission.stage_position(index);
                StageView {
                    index,
                    x: position.x,
                    y: position.y,
                    angle: self.transmission.stage_angle(driving, index),
                    is_top_row: position.is_top(),
                    rotation_text: format!(
                        "{} rev",
                        format_rotations(self.transmission.stage_rotation(driving, index))
                    ),
                    stage_label: format!("#{}", index + 1),
                }
            })
            .collect();
        let (first_visible, last_visible) = self.viewport.visible_summary();

        FrameView {
            stages,
            next_stage,
            offset: self.viewport.offset(),
            canvas_width: self.viewport.canvas_width(),
            canvas_height: self.viewport.canvas_height(),
            first_visible,
            last_visible,
            driving_summary: format!("{} rev", format_control(driving)),
            control_position: self.drive.control_position(),
            control_range: self.drive.control_range(),
            mode: self.drive.mode(),
            speed_per_second: self.drive.speed_per_second(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainConfig, DriveConfig};
    use crate::drive::SpeedUnit;
    use crate::input::InputAdapter;
    use float_cmp::approx_eq;
    use std::sync::mpsc;
    use winit::keyboard::{Key, SmolStr};

    fn state() -> GearTrainState {
        GearTrainState::new(&GearTrainConfig::default()).unwrap()
    }

    #[test]
    fn invalid_chain_is_rejected() {
        let config = GearTrainConfig::builder()
            .chain(ChainConfig {
                stage_count: 0,
                ..ChainConfig::default()
            })
            .build();
        assert!(GearTrainState::new(&config).is_err());
    }

    #[test]
    fn first_frame_shows_the_start_of_the_chain() {
        let view = state().frame();
        assert_eq!(view.stages.first().map(|s| s.index), Some(0));
        assert_eq!(view.stages[0].stage_label, "#1");
        assert_eq!(view.stages[0].rotation_text, "0 rev");
        assert!(view.stages[0].is_top_row);
        assert!(!view.stages[1].is_top_row);
        assert_eq!(view.driving_summary, "0.00 rev");
        assert_eq!(view.first_visible, 1);
    }

    #[test]
    fn drive_then_frame_reflects_new_rotation() {
        let mut state = state();
        state.apply(GearTrainCommand::SpeedChanged(5.0, SpeedUnit::PerSecond));
        state.apply(GearTrainCommand::DriveToggled);
        state.apply(GearTrainCommand::FrameTick(100.0));
        let view = state.frame();
        assert!(approx_eq!(f64, state.drive().driving_value(), 0.5));
        assert_eq!(view.stages[0].rotation_text, "0.500000 rev");
        assert_eq!(view.stages[1].rotation_text, "0.050000 rev");
        assert_eq!(view.stages[4].rotation_text, "5.000e-5 rev");
        assert!(view.stages[0].angle > 0.0);
        assert!(view.stages[1].angle < 0.0);
        assert_eq!(view.mode, Mode::ContinuousDrive);
    }

    #[test]
    fn queued_commands_apply_in_order() {
        let mut state = state();
        let (sender, receiver) = mpsc::channel();
        sender.send(GearTrainCommand::ManualPositionChanged(360.0)).unwrap();
        sender.send(GearTrainCommand::ManualReleased).unwrap();
        sender.send(GearTrainCommand::JumpToStage(40)).unwrap();
        state.drain(&receiver);
        assert!(approx_eq!(f64, state.drive().driving_value(), 1.0));
        assert_eq!(state.drive().mode(), Mode::Idle);
        assert!(state.frame().stages.iter().any(|s| s.index == 39));
    }

    #[test]
    fn next_stage_is_reported_until_the_chain_ends() {
        let mut state = state();
        let view = state.frame();
        let last = view.stages.last().unwrap().index;
        let expected = state.transmission().stage_position(last + 1);
        assert_eq!(view.next_stage, Some((expected.x, expected.y)));

        state.apply(GearTrainCommand::ScrollEnd);
        assert_eq!(state.frame().next_stage, None);
    }

    #[test]
    fn start_options_are_honoured() {
        let config = GearTrainConfig::builder()
            .auto_drive(true)
            .start_stage(60)
            .speed(30.0)
            .speed_unit(SpeedUnit::PerMinute)
            .build();
        let state = GearTrainState::new(&config).unwrap();
        assert!(state.drive().is_driving());
        assert!(approx_eq!(f64, state.drive().speed_per_second(), 0.5));
        assert!(state.viewport().visible_range().contains(&59));
    }

    #[test]
    fn frame_tick_respects_the_frame_ceiling() {
        let config = GearTrainConfig::builder()
            .drive(DriveConfig {
                max_frame_seconds: 0.05,
                ..DriveConfig::default()
            })
            .auto_drive(true)
            .build();
        let mut state = GearTrainState::new(&config).unwrap();
        state.apply(GearTrainCommand::FrameTick(5000.0));
        assert!(approx_eq!(f64, state.drive().driving_value(), 0.05));
    }

    fn press(state: &mut GearTrainState, config: &GearTrainConfig, text: &str) {
        let mut input = InputAdapter::new(config);
        let key = Key::Character(SmolStr::new(text));
        if let Some(command) = input.key_pressed(&key) {
            state.apply(command);
        }
    }

    #[test]
    fn speed_key_after_a_rejected_start_speed() {
        let config = GearTrainConfig::builder().speed(-3.0).build();
        let mut state = GearTrainState::new(&config).unwrap();
        assert!(approx_eq!(f64, state.drive().speed_per_second(), 1.0));
        press(&mut state, &config, "+");
        assert!(approx_eq!(f64, state.drive().speed_per_second(), 10.0));
        press(&mut state, &config, "u");
        assert_eq!(state.drive().speed_setting(), (10.0, SpeedUnit::PerMinute));
        assert!(approx_eq!(f64, state.drive().speed_per_second(), 10.0 / 60.0));
    }

    #[test]
    fn speed_key_scales_a_scripted_speed() {
        let config = GearTrainConfig::default();
        let mut state = GearTrainState::new(&config).unwrap();
        state.apply(GearTrainCommand::SpeedChanged(500.0, SpeedUnit::PerSecond));
        press(&mut state, &config, "+");
        assert!(approx_eq!(f64, state.drive().speed_per_second(), 5000.0));
        press(&mut state, &config, "-");
        assert!(approx_eq!(f64, state.drive().speed_per_second(), 500.0, epsilon = 1e-9));
    }

    #[test]
    fn visible_stage_count_follows_canvas_width() {
        let mut state = state();
        state.apply(GearTrainCommand::CanvasResized(280.0, 480.0));
        assert_eq!(state.frame().stages.len(), 5);
        state.apply(GearTrainCommand::CanvasResized(1400.0, 480.0));
        assert_eq!(state.frame().stages.len(), 13);
    }
}
