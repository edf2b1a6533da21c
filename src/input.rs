//! Translation of raw window input, and of scripted text lines, into
//! [`GearTrainCommand`]s.

use winit::event::MouseScrollDelta;
use winit::keyboard::{Key, NamedKey};

use crate::drive::SpeedUnit;
use crate::render::ControlTrack;
use crate::{GearTrainCommand, GearTrainConfig};

/// Pixels scrolled per wheel notch when the platform reports lines.
const LINE_HEIGHT: f64 = 40.0;
const MAX_JUMP_DIGITS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pointer {
    Released,
    Panning,
    OnControl,
}

/// Keeps the little bit of input state a window event alone cannot carry:
/// where the cursor is, what a held button grabbed and the stage number
/// being typed.
#[derive(Debug, Clone)]
pub struct InputAdapter {
    cursor: (f64, f64),
    pointer: Pointer,
    track: ControlTrack,
    control_range: f64,
    jump_digits: String,
}

impl InputAdapter {
    pub fn new(config: &GearTrainConfig) -> Self {
        Self {
            cursor: (0.0, 0.0),
            pointer: Pointer::Released,
            track: ControlTrack::for_canvas(
                config.window.width as f64,
                config.window.height as f64,
            ),
            control_range: config.drive.control_range,
            jump_digits: String::new(),
        }
    }

    /// Digits typed so far for a jump, not yet confirmed.
    pub fn pending_jump(&self) -> &str {
        &self.jump_digits
    }

    /// Re-derives the control hit area from the size of the drawn frame.
    pub fn set_canvas(&mut self, width: f64, height: f64) {
        self.track = ControlTrack::for_canvas(width, height);
    }

    pub fn key_pressed(&mut self, key: &Key) -> Option<GearTrainCommand> {
        match key {
            Key::Named(named) => self.named_key(*named),
            Key::Character(text) => self.character(text.as_str()),
            _ => None,
        }
    }

    fn named_key(&mut self, key: NamedKey) -> Option<GearTrainCommand> {
        match key {
            NamedKey::Space => Some(GearTrainCommand::DriveToggled),
            NamedKey::ArrowLeft => Some(GearTrainCommand::StepStages(-1.0)),
            NamedKey::ArrowRight => Some(GearTrainCommand::StepStages(1.0)),
            NamedKey::PageUp => Some(GearTrainCommand::Page { forward: false }),
            NamedKey::PageDown => Some(GearTrainCommand::Page { forward: true }),
            NamedKey::Home => Some(GearTrainCommand::ScrollHome),
            NamedKey::End => Some(GearTrainCommand::ScrollEnd),
            NamedKey::Enter => {
                let stage = self.jump_digits.parse::<i64>().unwrap_or(1);
                self.jump_digits.clear();
                Some(GearTrainCommand::JumpToStage(stage))
            }
            NamedKey::Backspace => {
                self.jump_digits.pop();
                None
            }
            NamedKey::Escape => {
                self.jump_digits.clear();
                None
            }
            _ => None,
        }
    }

    fn character(&mut self, text: &str) -> Option<GearTrainCommand> {
        match text {
            " " => Some(GearTrainCommand::DriveToggled),
            "r" | "R" => Some(GearTrainCommand::ResetRequested),
            "+" | "=" => Some(GearTrainCommand::ScaleSpeed(10.0)),
            "-" | "_" => Some(GearTrainCommand::ScaleSpeed(0.1)),
            "u" | "U" => Some(GearTrainCommand::ToggleSpeedUnit),
            digit if digit.len() == 1 && digit.bytes().all(|b| b.is_ascii_digit()) => {
                if self.jump_digits.len() < MAX_JUMP_DIGITS {
                    self.jump_digits.push_str(digit);
                }
                None
            }
            _ => None,
        }
    }

    pub fn cursor_moved(&mut self, x: f64, y: f64) -> Option<GearTrainCommand> {
        self.cursor = (x, y);
        match self.pointer {
            Pointer::Released => None,
            Pointer::Panning => Some(GearTrainCommand::DragMoved(x)),
            Pointer::OnControl => Some(GearTrainCommand::ManualPositionChanged(
                self.track.position_at(x, self.control_range),
            )),
        }
    }

    /// Primary button press or release at the last known cursor position.
    pub fn primary_button(&mut self, pressed: bool) -> Option<GearTrainCommand> {
        let (x, y) = self.cursor;
        match (pressed, self.pointer) {
            (true, Pointer::Released) => {
                if self.track.contains(x, y) {
                    self.pointer = Pointer::OnControl;
                    Some(GearTrainCommand::ManualPositionChanged(
                        self.track.position_at(x, self.control_range),
                    ))
                } else {
                    self.pointer = Pointer::Panning;
                    Some(GearTrainCommand::DragStarted(x))
                }
            }
            (false, Pointer::Panning) => {
                self.pointer = Pointer::Released;
                Some(GearTrainCommand::DragEnded)
            }
            (false, Pointer::OnControl) => {
                self.pointer = Pointer::Released;
                Some(GearTrainCommand::ManualReleased)
            }
            _ => None,
        }
    }

    pub fn wheel(&mut self, delta: MouseScrollDelta) -> Option<GearTrainCommand> {
        let (dx, dy) = match delta {
            MouseScrollDelta::LineDelta(x, y) => (x as f64 * LINE_HEIGHT, y as f64 * LINE_HEIGHT),
            MouseScrollDelta::PixelDelta(position) => (position.x, position.y),
        };
        // Vertical wheels dominate; sideways scrolling is the fallback.
        let pixels = if dy != 0.0 { -dy } else { -dx };
        if pixels == 0.0 || !pixels.is_finite() {
            None
        } else {
            Some(GearTrainCommand::Wheel(pixels))
        }
    }
}

/// Parses one line of the stdin control script.
///
/// Recognised forms: `drive`, `reset`, `release`, `home`, `end`,
/// `speed <value> [s|min]`, `jump <stage>`, `manual <position>`,
/// `pan <pixels>`. Blank lines and `#` comments yield `None`, as does
/// anything unrecognised.
pub fn parse_script_line(line: &str) -> Option<GearTrainCommand> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut words = line.split_whitespace();
    let verb = words.next()?.to_ascii_lowercase();
    let argument = words.next();
    let number = || argument.and_then(|a| a.parse::<f64>().ok());

    match verb.as_str() {
        "drive" | "toggle" => Some(GearTrainCommand::DriveToggled),
        "reset" => Some(GearTrainCommand::ResetRequested),
        "release" => Some(GearTrainCommand::ManualReleased),
        "home" => Some(GearTrainCommand::ScrollHome),
        "end" => Some(GearTrainCommand::ScrollEnd),
        "speed" => {
            let unit = match words.next() {
                Some("min") | Some("rev/min") => SpeedUnit::PerMinute,
                _ => SpeedUnit::PerSecond,
            };
            // Unparsable values are passed on and fall back to the default speed.
            Some(GearTrainCommand::SpeedChanged(
                number().unwrap_or(f64::NAN),
                unit,
            ))
        }
        "jump" => Some(GearTrainCommand::JumpToStage(
            argument.and_then(|a| a.parse::<i64>().ok()).unwrap_or(1),
        )),
        "manual" => number().map(GearTrainCommand::ManualPositionChanged),
        "pan" => number().map(GearTrainCommand::PanBy),
        _ => {
            log::debug!("ignoring script line '{}'", line);
            None
        }
    }
}
