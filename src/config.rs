use crate::error::GearTrainError;
use std::path::PathBuf;

/// Color representation for gear train elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn as_tuple(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }
}

/// Topology of the chain: how many stages and how each pair meshes
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub stage_count: usize,
    pub large_teeth: u32,
    pub small_teeth: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            stage_count: 100,
            large_teeth: 100,
            small_teeth: 10,
        }
    }
}

impl ChainConfig {
    /// Per-stage reduction, large gear teeth over pinion teeth.
    pub fn ratio(&self) -> f64 {
        self.large_teeth as f64 / self.small_teeth as f64
    }

    pub fn validate(&self) -> Result<(), GearTrainError> {
        if self.stage_count == 0 {
            return Err(GearTrainError::InvalidChain(
                "stage count must be at least 1".to_string(),
            ));
        }
        if self.small_teeth == 0 || self.large_teeth == 0 {
            return Err(GearTrainError::InvalidChain(
                "tooth counts must be positive".to_string(),
            ));
        }
        if self.ratio() <= 1.0 {
            return Err(GearTrainError::InvalidChain(format!(
                "ratio {}:{} does not reduce speed",
                self.large_teeth, self.small_teeth
            )));
        }
        Ok(())
    }
}

/// Pixel geometry of a stage and the two rails
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub large_radius: f64,
    pub small_radius: f64,
    pub large_tooth_height: f64,
    pub small_tooth_height: f64,
    pub stage_spacing: f64,
    pub top_rail_y: f64,
    pub left_margin: f64,
    pub label_gap: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            large_radius: 55.0,
            small_radius: 11.0,
            large_tooth_height: 6.0,
            small_tooth_height: 5.0,
            stage_spacing: 140.0,
            top_rail_y: 150.0,
            left_margin: 120.0,
            label_gap: 18.0,
        }
    }
}

impl LayoutConfig {
    /// Centre distance between a pinion and the large gear it drives.
    pub fn mesh_distance(&self) -> f64 {
        self.small_radius + self.large_radius + self.small_tooth_height + self.large_tooth_height
    }

    pub fn bottom_rail_y(&self) -> f64 {
        self.top_rail_y + self.mesh_distance()
    }
}

/// Scrolling behaviour of the horizontal viewport
#[derive(Debug, Clone)]
pub struct ViewportConfig {
    pub overscan: usize,
    pub trailing_margin: f64,
    pub min_canvas_width: f64,
    pub min_canvas_height: f64,
    pub wheel_factor: f64,
    pub page_stages: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            overscan: 3,
            trailing_margin: 100.0,
            min_canvas_width: 1.0,
            min_canvas_height: 420.0,
            wheel_factor: 0.8,
            page_stages: 3.0,
        }
    }
}

/// Timing and manual control settings for the driving value
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub max_frame_seconds: f64,
    pub control_range: f64,
    pub control_units_per_rotation: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_frame_seconds: 0.1,
            control_range: 3600.0,
            control_units_per_rotation: 360.0,
        }
    }
}

impl DriveConfig {
    /// Stage-0 rotations covered by one sweep of the manual control.
    pub fn control_span_rotations(&self) -> f64 {
        self.control_range / self.control_units_per_rotation
    }
}

/// Configuration for application window
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: usize,
    pub height: usize,
    pub max_framerate: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Gear Train".to_string(),
            width: 1200,
            height: 480,
            max_framerate: 60.0,
        }
    }
}

/// Where to look for the label font and how large to draw it
#[derive(Debug, Clone)]
pub struct FontConfig {
    pub path: Option<PathBuf>,
    pub candidates: Vec<PathBuf>,
    pub stage_label_size: f32,
    pub rotation_label_size: f32,
    pub status_size: f32,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            path: None,
            candidates: [
                "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
                "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
                "/usr/share/fonts/dejavu-sans-mono-fonts/DejaVuSansMono.ttf",
                "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
                "/Library/Fonts/Courier New.ttf",
                "/System/Library/Fonts/Supplemental/Courier New.ttf",
                "C:\\Windows\\Fonts\\consola.ttf",
                "C:\\Windows\\Fonts\\cour.ttf",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
            stage_label_size: 14.0,
            rotation_label_size: 12.0,
            status_size: 16.0,
        }
    }
}

/// Colors used by the renderer
#[derive(Debug, Clone)]
pub struct Palette {
    pub background: Color,
    pub large_stroke: Color,
    pub small_stroke: Color,
    pub axle: Color,
    pub hub: Color,
    pub label: Color,
    pub stage_number: Color,
    pub rail: Color,
    pub mesh_line: Color,
    pub control_track: Color,
    pub control_knob: Color,
    pub active: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::new(0x08, 0x08, 0x0e),
            large_stroke: Color::new(0x53, 0xd8, 0xfb),
            small_stroke: Color::new(0xe9, 0x45, 0x60),
            axle: Color::new(0xff, 0xd7, 0x00),
            hub: Color::new(0x1a, 0x1a, 0x2e),
            label: Color::new(0xff, 0xff, 0xff),
            stage_number: Color::new(0xff, 0xd7, 0x00),
            rail: Color::new(0xff, 0xd7, 0x00),
            mesh_line: Color::new(0x53, 0xd8, 0xfb),
            control_track: Color::new(0x33, 0x33, 0x4a),
            control_knob: Color::new(0x53, 0xd8, 0xfb),
            active: Color::new(0x4c, 0xd1, 0x37),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn default_chain_is_a_googol_train() {
        let chain = ChainConfig::default();
        assert!(chain.validate().is_ok());
        assert!(approx_eq!(f64, chain.ratio(), 10.0));
        assert_eq!(chain.stage_count, 100);
    }

    #[test]
    fn rejects_degenerate_chains() {
        let empty = ChainConfig {
            stage_count: 0,
            ..ChainConfig::default()
        };
        assert!(matches!(empty.validate(), Err(GearTrainError::InvalidChain(_))));

        let overdrive = ChainConfig {
            large_teeth: 10,
            small_teeth: 10,
            ..ChainConfig::default()
        };
        assert!(matches!(overdrive.validate(), Err(GearTrainError::InvalidChain(_))));

        let toothless = ChainConfig {
            small_teeth: 0,
            ..ChainConfig::default()
        };
        assert!(matches!(toothless.validate(), Err(GearTrainError::InvalidChain(_))));
    }

    #[test]
    fn rails_are_one_mesh_distance_apart() {
        let layout = LayoutConfig::default();
        assert!(approx_eq!(f64, layout.mesh_distance(), 77.0));
        assert!(approx_eq!(f64, layout.bottom_rail_y(), 227.0));
    }

    #[test]
    fn control_sweeps_ten_revolutions() {
        assert!(approx_eq!(
            f64,
            DriveConfig::default().control_span_rotations(),
            10.0
        ));
    }
}
