//! Owner of the driving value.
//!
//! Three sources move the train: continuous drive on every frame, the
//! bounded manual control, and reset. Only one of the first two is live at a
//! time, so the driving value never receives two conflicting deltas in one
//! frame.

use crate::config::DriveConfig;

/// Replaces the driving value whenever accumulation stops being finite.
/// Later increments overflow again and land back here, so the value never
/// moves backwards once it is pinned.
pub const DRIVING_VALUE_SENTINEL: f64 = f64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    ContinuousDrive,
    ManualDrag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedUnit {
    #[default]
    PerSecond,
    PerMinute,
}

impl SpeedUnit {
    pub fn toggled(self) -> Self {
        match self {
            SpeedUnit::PerSecond => SpeedUnit::PerMinute,
            SpeedUnit::PerMinute => SpeedUnit::PerSecond,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SpeedUnit::PerSecond => "rev/s",
            SpeedUnit::PerMinute => "rev/min",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Drive {
    config: DriveConfig,
    mode: Mode,
    driving_value: f64,
    speed_per_second: f64,
    // The operator's last accepted speed, in its own unit.
    speed_value: f64,
    speed_unit: SpeedUnit,
    control_position: f64,
    previous_control_position: f64,
}

impl Drive {
    pub fn new(config: DriveConfig) -> Self {
        Self {
            config,
            mode: Mode::Idle,
            driving_value: 0.0,
            speed_per_second: 1.0,
            speed_value: 1.0,
            speed_unit: SpeedUnit::PerSecond,
            control_position: 0.0,
            previous_control_position: 0.0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn driving_value(&self) -> f64 {
        self.driving_value
    }

    pub fn speed_per_second(&self) -> f64 {
        self.speed_per_second
    }

    /// Speed as entered, before conversion to revolutions per second.
    pub fn speed_setting(&self) -> (f64, SpeedUnit) {
        (self.speed_value, self.speed_unit)
    }

    /// Position the manual control should display, in `[0, control_range)`.
    pub fn control_position(&self) -> f64 {
        self.control_position
    }

    pub fn control_range(&self) -> f64 {
        self.config.control_range
    }

    pub fn is_driving(&self) -> bool {
        self.mode == Mode::ContinuousDrive
    }

    /// Flips continuous drive on or off. A manual drag in progress ends.
    pub fn toggle_drive(&mut self) {
        self.mode = match self.mode {
            Mode::ContinuousDrive => Mode::Idle,
            Mode::Idle | Mode::ManualDrag => Mode::ContinuousDrive,
        };
        log::debug!("drive mode is now {:?}", self.mode);
    }

    /// Advances the driving value by one frame of continuous drive.
    pub fn tick(&mut self, elapsed_seconds: f64) {
        if self.mode != Mode::ContinuousDrive {
            return;
        }
        let elapsed = if elapsed_seconds.is_finite() {
            elapsed_seconds.clamp(0.0, self.config.max_frame_seconds)
        } else {
            0.0
        };
        let increment = self.speed_per_second * elapsed;
        if increment.is_finite() {
            self.accumulate(increment);
        }
        self.mirror_control();
    }

    /// Feeds a new sample from the bounded manual control.
    ///
    /// The control reports positions only, so the magnitude of movement
    /// between two samples is all that can be recovered: moving the control
    /// back turns the train forward too, and a full back-and-forth between
    /// two samples counts as no movement at all.
    pub fn apply_manual_delta(&mut self, control_position: f64) {
        if self.mode == Mode::ContinuousDrive || !control_position.is_finite() {
            return;
        }
        if self.mode == Mode::Idle {
            self.mode = Mode::ManualDrag;
            log::debug!("manual drag started at {}", control_position);
        }
        let position = control_position.clamp(0.0, self.config.control_range);
        let delta = (position - self.previous_control_position).abs();
        self.accumulate(delta / self.config.control_units_per_rotation);
        self.previous_control_position = position;
        self.control_position = position;
    }

    /// Ends a manual drag. Has no effect in any other mode.
    pub fn release_manual(&mut self) {
        if self.mode == Mode::ManualDrag {
            self.mode = Mode::Idle;
            log::debug!("manual drag released");
        }
    }

    /// Sets the continuous drive rate. Anything but a finite positive value
    /// falls back to one revolution per unit.
    pub fn set_speed(&mut self, value: f64, unit: SpeedUnit) {
        self.speed_value = valid_speed(value);
        self.speed_unit = unit;
        self.convert_speed();
    }

    /// Multiplies the current speed setting by `factor`. A result that is
    /// not finite and positive leaves the speed unchanged.
    pub fn scale_speed(&mut self, factor: f64) {
        let next = self.speed_value * factor;
        if next.is_finite() && next > 0.0 {
            self.speed_value = next;
            self.convert_speed();
        } else {
            log::debug!("speed {} x {} out of range, ignored", self.speed_value, factor);
        }
    }

    /// Keeps the entered number and reads it in the other unit.
    pub fn toggle_speed_unit(&mut self) {
        self.speed_unit = self.speed_unit.toggled();
        self.convert_speed();
    }

    fn convert_speed(&mut self) {
        self.speed_per_second = match self.speed_unit {
            SpeedUnit::PerSecond => self.speed_value,
            SpeedUnit::PerMinute => self.speed_value / 60.0,
        };
        log::debug!("speed set to {} rev/s", self.speed_per_second);
    }

    pub fn reset(&mut self) {
        self.driving_value = 0.0;
        self.control_position = 0.0;
        self.previous_control_position = 0.0;
        self.mode = Mode::Idle;
        log::debug!("drive reset");
    }

    fn accumulate(&mut self, delta: f64) {
        let next = self.driving_value + delta;
        if next.is_finite() {
            self.driving_value = next;
        } else {
            let direction = if delta != 0.0 { delta } else { self.driving_value };
            let pinned = DRIVING_VALUE_SENTINEL.copysign(direction);
            if self.driving_value != pinned {
                log::warn!("driving value overflowed, holding at {:e}", pinned);
            }
            self.driving_value = pinned;
        }
    }

    // The control wraps every `control_span_rotations` turns of stage 0.
    // Display only: the manual baseline stays at the last manual sample, so
    // the first sample after driving is measured from there, not from the
    // mirrored position.
    fn mirror_control(&mut self) {
        let span = self.config.control_span_rotations();
        let wrapped = self.driving_value % span;
        let position = if wrapped.is_finite() {
            (wrapped / span * self.config.control_range).abs() % self.config.control_range
        } else {
            0.0
        };
        self.control_position = position;
    }
}

fn valid_speed(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        log::warn!("speed {} rejected, using 1", value);
        1.0
    }
}
