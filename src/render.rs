// ============================================================================
// RENDERING
// ============================================================================
//
// A frame is first turned into a retained `Scene` of draw commands, then
// rasterised onto the pixel frame. Building the scene is pure and testable
// without a window.

use std::f64::consts::TAU;
use std::fs;
use std::path::Path;

use rusttype::{point, Font, PositionedGlyph, Scale};

use crate::config::{Color, FontConfig};
use crate::drive::Mode;
use crate::error::GearTrainError;
use crate::format::format_rotations;
use crate::state::{FrameView, StageView};
use crate::GearTrainConfig;

// Tooth profile as fractions of one tooth pitch: gap, rise, top, fall.
const TOOTH_GAP: f64 = 0.25;
const TOOTH_RISE: f64 = 0.12;
const TOOTH_TOP: f64 = 0.26;

const LARGE_SPOKES: usize = 6;
const SMALL_SPOKES: usize = 3;
const SMALL_HUB_RADIUS: f64 = 3.0;

const RAIL_ALPHA: f32 = 0.15;
const MESH_ALPHA: f32 = 0.2;
const BODY_ALPHA: f32 = 0.06;
const LARGE_SPOKE_ALPHA: f32 = 0.2;
const SMALL_SPOKE_ALPHA: f32 = 0.3;

const TRACK_MARGIN: f64 = 40.0;
const TRACK_FROM_BOTTOM: f64 = 64.0;
const TRACK_HIT_HALF_HEIGHT: f64 = 12.0;
const KNOB_RADIUS: f64 = 8.0;
const STATUS_FROM_BOTTOM: f64 = 24.0;

// ============================================================================
// MANUAL CONTROL TRACK
// ============================================================================

/// Screen geometry of the bounded manual control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlTrack {
    pub x0: f64,
    pub x1: f64,
    pub y: f64,
}

impl ControlTrack {
    pub fn for_canvas(width: f64, height: f64) -> Self {
        let x0 = TRACK_MARGIN;
        let x1 = (width - TRACK_MARGIN).max(x0 + 1.0);
        Self {
            x0,
            x1,
            y: height - TRACK_FROM_BOTTOM,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (y - self.y).abs() <= TRACK_HIT_HALF_HEIGHT
            && x >= self.x0 - KNOB_RADIUS
            && x <= self.x1 + KNOB_RADIUS
    }

    /// Control position under screen coordinate `x`, clamped to the track.
    pub fn position_at(&self, x: f64, range: f64) -> f64 {
        let t = (x - self.x0) / (self.x1 - self.x0);
        if t.is_finite() {
            t.clamp(0.0, 1.0) * range
        } else {
            0.0
        }
    }

    pub fn knob_x(&self, position: f64, range: f64) -> f64 {
        let t = position / range;
        if t.is_finite() {
            self.x0 + t.clamp(0.0, 1.0) * (self.x1 - self.x0)
        } else {
            self.x0
        }
    }
}

// ============================================================================
// FONT LOADING
// ============================================================================

/// Loads the explicit font if one is configured, otherwise the first
/// readable candidate.
pub fn load_font(config: &FontConfig) -> Result<Font<'static>, GearTrainError> {
    if let Some(path) = &config.path {
        return read_font(path);
    }
    for candidate in &config.candidates {
        match read_font(candidate) {
            Ok(font) => {
                log::info!("using font {}", candidate.display());
                return Ok(font);
            }
            Err(err) => log::debug!("{}", err),
        }
    }
    Err(GearTrainError::NoFont {
        searched: config.candidates.len(),
    })
}

fn read_font(path: &Path) -> Result<Font<'static>, GearTrainError> {
    let data = fs::read(path).map_err(|source| GearTrainError::FontRead {
        path: path.to_path_buf(),
        source,
    })?;
    Font::try_from_vec(data).ok_or_else(|| GearTrainError::FontParse {
        path: path.to_path_buf(),
    })
}

// ============================================================================
// RETAINED MODE ABSTRACTIONS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum DrawCommand {
    Clear(Color),
    Line {
        from: (f64, f64),
        to: (f64, f64),
        thickness: f32,
        color: Color,
        alpha: f32,
    },
    Dashed {
        from: (f64, f64),
        to: (f64, f64),
        thickness: f32,
        dash: f64,
        gap: f64,
        color: Color,
        alpha: f32,
    },
    Outline {
        points: Vec<(f64, f64)>,
        thickness: f32,
        color: Color,
    },
    Disc {
        center: (f64, f64),
        radius: f64,
        color: Color,
        alpha: f32,
    },
    Ring {
        center: (f64, f64),
        radius: f64,
        thickness: f64,
        color: Color,
        alpha: f32,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        font_size: f32,
        color: Color,
    },
}

pub(crate) struct Scene {
    commands: Vec<DrawCommand>,
}

impl Scene {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    fn add_command(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    #[cfg(test)]
    fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Rasterises every command in order. Text is skipped without a font.
    fn render(&self, canvas: &mut Canvas, font: Option<&Font>) {
        for command in &self.commands {
            match command {
                DrawCommand::Clear(color) => canvas.clear(*color),
                DrawCommand::Line {
                    from,
                    to,
                    thickness,
                    color,
                    alpha,
                } => draw_line_aa(canvas, *from, *to, *thickness, *color, *alpha),
                DrawCommand::Dashed {
                    from,
                    to,
                    thickness,
                    dash,
                    gap,
                    color,
                    alpha,
                } => draw_dashed_line(canvas, *from, *to, *thickness, *dash, *gap, *color, *alpha),
                DrawCommand::Outline {
                    points,
                    thickness,
                    color,
                } => {
                    for pair in points.windows(2) {
                        draw_line_aa(canvas, pair[0], pair[1], *thickness, *color, 1.0);
                    }
                    if let (Some(last), Some(first)) = (points.last(), points.first()) {
                        draw_line_aa(canvas, *last, *first, *thickness, *color, 1.0);
                    }
                }
                DrawCommand::Disc {
                    center,
                    radius,
                    color,
                    alpha,
                } => fill_disc(canvas, *center, *radius, *color, *alpha),
                DrawCommand::Ring {
                    center,
                    radius,
                    thickness,
                    color,
                    alpha,
                } => draw_ring(canvas, *center, *radius, *thickness, *color, *alpha),
                DrawCommand::Text {
                    x,
                    y,
                    text,
                    font_size,
                    color,
                } => {
                    if let Some(font) = font {
                        draw_text(canvas, *x, *y, text, font, Scale::uniform(*font_size), *color);
                    }
                }
            }
        }
    }
}

pub struct Canvas<'a> {
    frame: &'a mut [u8],
    width: usize,
    height: usize,
}

impl<'a> Canvas<'a> {
    pub fn new(frame: &'a mut [u8], width: usize, height: usize) -> Self {
        // Rows beyond the end of the frame are not drawable.
        let height = if width == 0 {
            0
        } else {
            height.min(frame.len() / (width * 4))
        };
        Self {
            frame,
            width,
            height,
        }
    }

    fn clear(&mut self, color: Color) {
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&[color.r, color.g, color.b, 0xff]);
        }
    }
}

// ============================================================================
// SCENE CONSTRUCTION
// ============================================================================

/// Draws one frame. `pending_jump` is the stage number being typed, if any.
///
/// The control track and status line are placed against the canvas itself,
/// which may be shorter than the viewport's minimum height.
pub fn render_frame(
    canvas: &mut Canvas,
    view: &FrameView,
    config: &GearTrainConfig,
    font: Option<&Font>,
    pending_jump: &str,
) {
    let surface = (canvas.width as f64, canvas.height as f64);
    build_scene(view, config, surface, pending_jump).render(canvas, font);
}

pub(crate) fn build_scene(
    view: &FrameView,
    config: &GearTrainConfig,
    surface: (f64, f64),
    pending_jump: &str,
) -> Scene {
    let palette = &config.palette;
    let layout = &config.layout;
    let mut scene = Scene::new();
    scene.add_command(DrawCommand::Clear(palette.background));

    for rail_y in [layout.top_rail_y, layout.bottom_rail_y()] {
        scene.add_command(DrawCommand::Dashed {
            from: (-20.0, rail_y),
            to: (surface.0 + 20.0, rail_y),
            thickness: 2.0,
            dash: 10.0,
            gap: 10.0,
            color: palette.rail,
            alpha: RAIL_ALPHA,
        });
    }

    let axles: Vec<(f64, f64)> = view
        .stages
        .iter()
        .map(|stage| (stage.x, stage.y))
        .chain(view.next_stage)
        .collect();
    for pair in axles.windows(2) {
        scene.add_command(DrawCommand::Dashed {
            from: (pair[0].0 - view.offset, pair[0].1),
            to: (pair[1].0 - view.offset, pair[1].1),
            thickness: 1.0,
            dash: 3.0,
            gap: 6.0,
            color: palette.mesh_line,
            alpha: MESH_ALPHA,
        });
    }

    for stage in &view.stages {
        add_stage(&mut scene, stage, view.offset, config);
    }

    add_control(&mut scene, view, config, surface);
    add_status(&mut scene, view, config, surface, pending_jump);
    scene
}

fn add_stage(scene: &mut Scene, stage: &StageView, offset: f64, config: &GearTrainConfig) {
    let palette = &config.palette;
    let layout = &config.layout;
    let center = (stage.x - offset, stage.y);

    // Large gear
    scene.add_command(DrawCommand::Outline {
        points: gear_outline(
            center,
            layout.large_radius,
            layout.large_tooth_height,
            config.chain.large_teeth,
            stage.angle,
        ),
        thickness: 1.0,
        color: palette.large_stroke,
    });
    let body = layout.large_radius * 0.7;
    scene.add_command(DrawCommand::Disc {
        center,
        radius: body,
        color: palette.large_stroke,
        alpha: BODY_ALPHA,
    });
    scene.add_command(DrawCommand::Ring {
        center,
        radius: body,
        thickness: 0.5,
        color: palette.large_stroke,
        alpha: 0.4,
    });
    let large_hub = layout.large_radius * 0.12;
    add_spokes(
        scene,
        center,
        stage.angle,
        LARGE_SPOKES,
        (large_hub, layout.large_radius * 0.68),
        1.5,
        palette.large_stroke,
        LARGE_SPOKE_ALPHA,
    );
    add_hub(scene, center, large_hub, 2.0, config);

    // Pinion on the same axle
    scene.add_command(DrawCommand::Outline {
        points: gear_outline(
            center,
            layout.small_radius,
            layout.small_tooth_height,
            config.chain.small_teeth,
            stage.angle,
        ),
        thickness: 1.5,
        color: palette.small_stroke,
    });
    add_spokes(
        scene,
        center,
        stage.angle,
        SMALL_SPOKES,
        (SMALL_HUB_RADIUS, layout.small_radius * 0.7),
        1.0,
        palette.small_stroke,
        SMALL_SPOKE_ALPHA,
    );
    add_hub(scene, center, SMALL_HUB_RADIUS, 1.5, config);

    let label_offset = layout.large_radius + layout.large_tooth_height + layout.label_gap;
    let label_y = if stage.is_top_row {
        center.1 - label_offset
    } else {
        center.1 + label_offset + 12.0
    };
    scene.add_command(DrawCommand::Text {
        x: center.0,
        y: label_y,
        text: stage.stage_label.clone(),
        font_size: config.font.stage_label_size,
        color: palette.stage_number,
    });
    scene.add_command(DrawCommand::Text {
        x: center.0,
        y: label_y + 14.0,
        text: stage.rotation_text.clone(),
        font_size: config.font.rotation_label_size,
        color: palette.label,
    });
}

#[allow(clippy::too_many_arguments)]
fn add_spokes(
    scene: &mut Scene,
    center: (f64, f64),
    angle: f64,
    count: usize,
    (inner, outer): (f64, f64),
    thickness: f32,
    color: Color,
    alpha: f32,
) {
    for i in 0..count {
        let spoke = angle + i as f64 / count as f64 * TAU;
        let (sin, cos) = spoke.sin_cos();
        scene.add_command(DrawCommand::Line {
            from: (center.0 + cos * inner, center.1 + sin * inner),
            to: (center.0 + cos * outer, center.1 + sin * outer),
            thickness,
            color,
            alpha,
        });
    }
}

fn add_hub(scene: &mut Scene, center: (f64, f64), radius: f64, rim: f64, config: &GearTrainConfig) {
    scene.add_command(DrawCommand::Disc {
        center,
        radius,
        color: config.palette.hub,
        alpha: 1.0,
    });
    scene.add_command(DrawCommand::Ring {
        center,
        radius,
        thickness: rim,
        color: config.palette.axle,
        alpha: 1.0,
    });
}

fn add_control(
    scene: &mut Scene,
    view: &FrameView,
    config: &GearTrainConfig,
    surface: (f64, f64),
) {
    let palette = &config.palette;
    let track = ControlTrack::for_canvas(surface.0, surface.1);
    scene.add_command(DrawCommand::Line {
        from: (track.x0, track.y),
        to: (track.x1, track.y),
        thickness: 4.0,
        color: palette.control_track,
        alpha: 1.0,
    });
    let knob_color = if view.mode == Mode::ManualDrag {
        palette.active
    } else {
        palette.control_knob
    };
    scene.add_command(DrawCommand::Disc {
        center: (
            track.knob_x(view.control_position, view.control_range),
            track.y,
        ),
        radius: KNOB_RADIUS,
        color: knob_color,
        alpha: 1.0,
    });
    scene.add_command(DrawCommand::Text {
        x: surface.0 / 2.0,
        y: track.y - 20.0,
        text: view.driving_summary.clone(),
        font_size: config.font.status_size,
        color: palette.label,
    });
}

fn add_status(
    scene: &mut Scene,
    view: &FrameView,
    config: &GearTrainConfig,
    surface: (f64, f64),
    pending_jump: &str,
) {
    let palette = &config.palette;
    let driving = view.mode == Mode::ContinuousDrive;
    let mut text = format!(
        "Gears: {}\u{2013}{}   speed {} rev/s   drive {}",
        view.first_visible,
        view.last_visible,
        format_rotations(view.speed_per_second),
        if driving { "on" } else { "off" },
    );
    if !pending_jump.is_empty() {
        text.push_str(&format!("   go to #{}_", pending_jump));
    }
    scene.add_command(DrawCommand::Text {
        x: surface.0 / 2.0,
        y: surface.1 - STATUS_FROM_BOTTOM,
        text,
        font_size: config.font.status_size,
        color: if driving { palette.active } else { palette.label },
    });
}

/// Closed outline of a toothed gear, rotated by `angle`.
pub(crate) fn gear_outline(
    center: (f64, f64),
    radius: f64,
    tooth_height: f64,
    teeth: u32,
    angle: f64,
) -> Vec<(f64, f64)> {
    let teeth = teeth.max(1);
    let pitch = TAU / teeth as f64;
    let outer = radius + tooth_height;
    let at = |a: f64, r: f64| {
        let (sin, cos) = (angle + a).sin_cos();
        (center.0 + cos * r, center.1 + sin * r)
    };

    let mut points = Vec::with_capacity(teeth as usize * 5);
    for i in 0..teeth {
        let start = i as f64 * pitch;
        let gap_end = start + TOOTH_GAP * pitch;
        let rise_end = gap_end + TOOTH_RISE * pitch;
        let top_end = rise_end + TOOTH_TOP * pitch;
        let fall_end = top_end + TOOTH_RISE * pitch;
        points.push(at(start, radius));
        points.push(at(gap_end, radius));
        points.push(at(rise_end, outer));
        points.push(at(top_end, outer));
        points.push(at(fall_end, radius));
    }
    points
}

// ============================================================================
// DRAWING PRIMITIVES
// ============================================================================

fn set_pixel(canvas: &mut Canvas, x: usize, y: usize, color: Color, alpha: f32) {
    if x >= canvas.width || y >= canvas.height {
        return;
    }
    let idx = (y * canvas.width + x) * 4;
    let a = alpha.clamp(0.0, 1.0);
    let blend = |src: u8, dst: u8| (src as f32 * a + dst as f32 * (1.0 - a)).round() as u8;
    let out = [
        blend(color.r, canvas.frame[idx]),
        blend(color.g, canvas.frame[idx + 1]),
        blend(color.b, canvas.frame[idx + 2]),
        0xff,
    ];
    canvas.frame[idx..idx + 4].copy_from_slice(&out);
}

/// Pixel bounds of a box, clipped to the canvas. `None` if nothing is visible.
fn clip_box(
    canvas: &Canvas,
    min: (f64, f64),
    max: (f64, f64),
) -> Option<(usize, usize, usize, usize)> {
    if canvas.width == 0 || canvas.height == 0 {
        return None;
    }
    if ![min.0, min.1, max.0, max.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let x_max = canvas.width as f64 - 1.0;
    let y_max = canvas.height as f64 - 1.0;
    if max.0 < 0.0 || max.1 < 0.0 || min.0 > x_max || min.1 > y_max {
        return None;
    }
    Some((
        min.0.floor().max(0.0) as usize,
        min.1.floor().max(0.0) as usize,
        max.0.ceil().min(x_max) as usize,
        max.1.ceil().min(y_max) as usize,
    ))
}

fn draw_line_aa(
    canvas: &mut Canvas,
    from: (f64, f64),
    to: (f64, f64),
    thickness: f32,
    color: Color,
    alpha: f32,
) {
    let reach = thickness as f64 / 2.0 + 1.0;
    let Some((x0, y0, x1, y1)) = clip_box(
        canvas,
        (from.0.min(to.0) - reach, from.1.min(to.1) - reach),
        (from.0.max(to.0) + reach, from.1.max(to.1) + reach),
    ) else {
        return;
    };
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let len_sq = dx * dx + dy * dy;
    let half = thickness as f64 / 2.0;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let px = x as f64 - from.0;
            let py = y as f64 - from.1;
            let t = if len_sq > 0.0 {
                ((px * dx + py * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let dist = ((px - t * dx).powi(2) + (py - t * dy).powi(2)).sqrt();
            let aa = (1.0 - (dist - half).clamp(0.0, 1.0)) as f32;
            if aa > 0.01 {
                set_pixel(canvas, x, y, color, aa * alpha);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_dashed_line(
    canvas: &mut Canvas,
    from: (f64, f64),
    to: (f64, f64),
    thickness: f32,
    dash: f64,
    gap: f64,
    color: Color,
    alpha: f32,
) {
    let length = (to.0 - from.0).hypot(to.1 - from.1);
    if !length.is_finite() || length == 0.0 {
        return;
    }
    if dash <= 0.0 || dash + gap <= 0.0 {
        draw_line_aa(canvas, from, to, thickness, color, alpha);
        return;
    }
    let ux = (to.0 - from.0) / length;
    let uy = (to.1 - from.1) / length;
    let mut t = 0.0;
    while t < length {
        let end = (t + dash).min(length);
        draw_line_aa(
            canvas,
            (from.0 + ux * t, from.1 + uy * t),
            (from.0 + ux * end, from.1 + uy * end),
            thickness,
            color,
            alpha,
        );
        t += dash + gap;
    }
}

fn fill_disc(canvas: &mut Canvas, center: (f64, f64), radius: f64, color: Color, alpha: f32) {
    let reach = radius + 1.0;
    let Some((x0, y0, x1, y1)) = clip_box(
        canvas,
        (center.0 - reach, center.1 - reach),
        (center.0 + reach, center.1 + reach),
    ) else {
        return;
    };
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dist = (x as f64 - center.0).hypot(y as f64 - center.1);
            let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0) as f32;
            if coverage > 0.0 {
                set_pixel(canvas, x, y, color, coverage * alpha);
            }
        }
    }
}

fn draw_ring(
    canvas: &mut Canvas,
    center: (f64, f64),
    radius: f64,
    thickness: f64,
    color: Color,
    alpha: f32,
) {
    let half = thickness / 2.0;
    let reach = radius + half + 1.0;
    let Some((x0, y0, x1, y1)) = clip_box(
        canvas,
        (center.0 - reach, center.1 - reach),
        (center.0 + reach, center.1 + reach),
    ) else {
        return;
    };
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dist = (x as f64 - center.0).hypot(y as f64 - center.1);
            let coverage = (half + 0.5 - (dist - radius).abs()).clamp(0.0, 1.0) as f32;
            if coverage > 0.0 {
                set_pixel(canvas, x, y, color, coverage * alpha);
            }
        }
    }
}

/// Draws `text` centred on `(x, y)`.
fn draw_text(canvas: &mut Canvas, x: f64, y: f64, text: &str, font: &Font, scale: Scale, color: Color) {
    let v_metrics = font.v_metrics(scale);
    let glyphs: Vec<PositionedGlyph> = font
        .layout(text, scale, point(0.0, v_metrics.ascent))
        .collect();
    let (min_x, max_x, min_y, max_y) = glyphs.iter().filter_map(|g| g.pixel_bounding_box()).fold(
        (i32::MAX, i32::MIN, i32::MAX, i32::MIN),
        |(min_x, max_x, min_y, max_y), bb| {
            (
                min_x.min(bb.min.x),
                max_x.max(bb.max.x),
                min_y.min(bb.min.y),
                max_y.max(bb.max.y),
            )
        },
    );
    if min_x >= max_x || min_y >= max_y {
        return;
    }
    let offset_x = x.round() as i32 - (max_x - min_x) / 2;
    let offset_y = y.round() as i32 - (max_y - min_y) / 2;
    for glyph in &glyphs {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, v| {
                let px = offset_x + gx as i32 + bb.min.x - min_x;
                let py = offset_y + gy as i32 + bb.min.y - min_y;
                if px >= 0 && py >= 0 {
                    set_pixel(canvas, px as usize, py as usize, color, v);
                }
            });
        }
    }
}
