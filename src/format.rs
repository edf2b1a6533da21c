//! Bounded-width text for rotation counts.
//!
//! Every stage label and the control readout pass through here, so the
//! output must stay short regardless of how large or small the value is.

/// Shown for values that are not finite.
pub const NON_FINITE: &str = "∞";

const SCIENTIFIC_ABOVE: f64 = 1e6;
const FINE_BELOW: f64 = 1.0;
const SCIENTIFIC_BELOW: f64 = 0.001;

/// Formats a stage rotation count for its label.
pub fn format_rotations(value: f64) -> String {
    if !value.is_finite() {
        return NON_FINITE.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if magnitude >= SCIENTIFIC_ABOVE {
        scientific(value, 2)
    } else if magnitude >= FINE_BELOW {
        format!("{:.2}", value)
    } else if magnitude >= SCIENTIFIC_BELOW {
        format!("{:.6}", value)
    } else {
        scientific(value, 3)
    }
}

/// Formats the driving value for the manual control readout.
///
/// Coarser than [`format_rotations`]: the readout only needs two decimals
/// until the value outgrows the fixed-point width.
pub fn format_control(value: f64) -> String {
    if !value.is_finite() {
        return NON_FINITE.to_string();
    }
    if value == 0.0 {
        return "0.00".to_string();
    }
    if value.abs() >= SCIENTIFIC_ABOVE {
        scientific(value, 2)
    } else {
        format!("{:.2}", value)
    }
}

/// `1.50e+7` style: fixed mantissa digits and an always-signed exponent.
fn scientific(value: f64, digits: usize) -> String {
    let raw = format!("{:.*e}", digits, value);
    match raw.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => raw,
    }
}
