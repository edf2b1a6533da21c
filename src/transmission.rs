//! Stage rotations and angles derived from the driving value.
//!
//! Every stage is computed straight from the driving value by a single
//! division, never from its neighbour, so the error of a deep stage is one
//! division's worth no matter how long the train has been running.

use std::f64::consts::TAU;

use crate::config::{ChainConfig, LayoutConfig};
use crate::error::GearTrainError;

/// Which of the two shafts a stage sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rail {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagePosition {
    pub x: f64,
    pub y: f64,
    pub rail: Rail,
}

impl StagePosition {
    pub fn is_top(&self) -> bool {
        self.rail == Rail::Top
    }
}

#[derive(Debug, Clone)]
pub struct Transmission {
    stage_count: usize,
    ratio: f64,
    layout: LayoutConfig,
}

impl Transmission {
    pub fn new(chain: &ChainConfig, layout: LayoutConfig) -> Result<Self, GearTrainError> {
        chain.validate()?;
        Ok(Self {
            stage_count: chain.stage_count,
            ratio: chain.ratio(),
            layout,
        })
    }

    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Total rotations of `stage` when stage 0 has turned `driving` times.
    ///
    /// Deep stages underflow towards zero, which is the physically correct
    /// reading; anything non-finite is reported as zero.
    pub fn stage_rotation(&self, driving: f64, stage: usize) -> f64 {
        let rotation = if stage == 0 {
            driving
        } else {
            let exponent = i32::try_from(stage).unwrap_or(i32::MAX);
            driving / self.ratio.powi(exponent)
        };
        if rotation.is_finite() {
            rotation
        } else {
            0.0
        }
    }

    /// Drawn angle of `stage` in radians.
    ///
    /// Only the fractional turn is kept, so the result stays in `[0, 2π)` on
    /// even stages and `(-2π, 0]` on odd stages, which turn the other way.
    pub fn stage_angle(&self, driving: f64, stage: usize) -> f64 {
        let rotation = self.stage_rotation(driving, stage);
        let fraction = rotation.rem_euclid(1.0);
        let angle = fraction * TAU;
        // rem_euclid of a tiny negative rotation rounds up to a full turn
        if !angle.is_finite() || !(0.0..TAU).contains(&angle) {
            return 0.0;
        }
        if stage % 2 == 1 {
            -angle
        } else {
            angle
        }
    }

    pub fn stage_position(&self, stage: usize) -> StagePosition {
        let x = self.layout.left_margin + stage as f64 * self.layout.stage_spacing;
        if stage % 2 == 0 {
            StagePosition {
                x,
                y: self.layout.top_rail_y,
                rail: Rail::Top,
            }
        } else {
            StagePosition {
                x,
                y: self.layout.bottom_rail_y(),
                rail: Rail::Bottom,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn googol_train() -> Transmission {
        Transmission::new(&ChainConfig::default(), LayoutConfig::default()).unwrap()
    }

    #[test]
    fn stage_zero_is_the_driving_value() {
        let train = googol_train();
        assert!(approx_eq!(f64, train.stage_rotation(12.5, 0), 12.5));
        assert!(approx_eq!(f64, train.stage_rotation(-3.0, 0), -3.0));
    }

    #[test]
    fn each_stage_divides_by_the_ratio() {
        let train = googol_train();
        assert!(approx_eq!(f64, train.stage_rotation(1000.0, 1), 100.0));
        assert!(approx_eq!(f64, train.stage_rotation(1000.0, 3), 1.0));
        assert!(approx_eq!(
            f64,
            train.stage_rotation(1.0, 99),
            1e-99,
            epsilon = 1e-110
        ));
    }

    #[test]
    fn non_finite_driving_value_reads_as_zero() {
        let train = googol_train();
        for stage in [0, 1, 50] {
            assert_eq!(train.stage_rotation(f64::NAN, stage), 0.0);
            assert_eq!(train.stage_rotation(f64::INFINITY, stage), 0.0);
            assert_eq!(train.stage_angle(f64::NEG_INFINITY, stage), 0.0);
        }
    }

    #[test]
    fn stages_beyond_the_float_range_stand_still() {
        let chain = ChainConfig {
            stage_count: 400,
            ..ChainConfig::default()
        };
        let train = Transmission::new(&chain, LayoutConfig::default()).unwrap();
        assert_eq!(train.stage_rotation(f64::MAX, 350), 0.0);
        assert_eq!(train.stage_angle(f64::MAX, 350), 0.0);
        assert!(train.stage_rotation(f64::MAX, 300) > 0.0);
    }

    #[test]
    fn quarter_turn_angles() {
        let train = googol_train();
        assert!(approx_eq!(f64, train.stage_angle(0.25, 0), TAU / 4.0));
        assert!(approx_eq!(f64, train.stage_angle(2.5, 1), -TAU / 4.0));
        // whole turns draw as the rest position
        assert!(approx_eq!(f64, train.stage_angle(7.0, 0), 0.0));
    }

    #[test]
    fn reversed_driving_value_stays_in_range() {
        let train = googol_train();
        assert!(approx_eq!(f64, train.stage_angle(-0.25, 0), TAU * 0.75));
        assert_eq!(train.stage_angle(-1e-300, 0), 0.0);
    }

    #[test]
    fn astronomically_large_values_lose_the_fraction_gracefully() {
        let train = googol_train();
        // far above 2^53 the fractional part of stage 0 is gone
        assert_eq!(train.stage_angle(1e30, 0), 0.0);
        let deep = train.stage_angle(1e30, 31);
        assert!(deep <= 0.0 && deep > -TAU);
    }

    #[test]
    fn stages_alternate_rails() {
        let train = googol_train();
        let first = train.stage_position(0);
        let second = train.stage_position(1);
        let third = train.stage_position(2);
        assert!(first.is_top());
        assert_eq!(second.rail, Rail::Bottom);
        assert!(third.is_top());
        assert!(approx_eq!(f64, first.x, 120.0));
        assert!(approx_eq!(f64, second.x, 260.0));
        assert!(approx_eq!(f64, first.y, third.y));
        assert!(approx_eq!(f64, second.y - first.y, 77.0));
    }

    proptest! {
        #[test]
        fn rotation_is_a_single_division(d in -1e300f64..1e300, stage in 1usize..100) {
            let train = googol_train();
            let expected = d / 10f64.powi(stage as i32);
            prop_assert_eq!(train.stage_rotation(d, stage), expected);
        }

        #[test]
        fn angle_stays_within_one_turn(d in any::<f64>(), stage in 0usize..100) {
            let train = googol_train();
            let angle = train.stage_angle(d, stage);
            if stage % 2 == 0 {
                prop_assert!((0.0..TAU).contains(&angle));
            } else {
                prop_assert!(angle <= 0.0 && angle > -TAU);
            }
        }

        #[test]
        fn neighbours_turn_opposite_ways(d in -1e12f64..1e12, stage in 0usize..99) {
            let train = googol_train();
            let a = train.stage_angle(d, stage);
            let b = train.stage_angle(d, stage + 1);
            if a != 0.0 && b != 0.0 {
                prop_assert_ne!(a.signum(), b.signum());
            }
        }
    }
}
