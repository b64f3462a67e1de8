//! Publication figure styling.
//!
//! Zero configuration: users do not pick fonts or sizes. One sans-serif
//! face, a small type scale, no top/right chrome, thin strokes, and a
//! restrained palette. All figures share these constants so the output
//! bundle looks like one paper, not four tools.

use plotters::prelude::*;

pub const FONT: &str = "sans-serif";

/// Canvas size shared by the raster and vector outputs.
pub const FIGURE_SIZE: (u32, u32) = (1600, 1200);

pub const TITLE_SIZE: u32 = 36;
pub const LABEL_SIZE: u32 = 28;
pub const TICK_SIZE: u32 = 24;
pub const ANNOTATION_SIZE: u32 = 22;
pub const WATERMARK_SIZE: u32 = 16;

pub const NATURE_RED: RGBColor = RGBColor(0xE6, 0x4B, 0x35);
pub const NATURE_BLUE: RGBColor = RGBColor(0x3C, 0x54, 0x88);
pub const NATURE_MUTED: RGBColor = RGBColor(0xB0, 0x9C, 0x85);
pub const WATERMARK_GREY: RGBColor = RGBColor(0x80, 0x80, 0x80);

/// Word-wraps a label onto multiple lines of at most `width` characters.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_owned();
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_owned();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Truncates long axis labels so a heatmap does not collapse under its own
/// tick text.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        text.to_owned()
    }
}

/// Blue-white-red diverging map over `[-1, 1]`, white at zero. Inputs are
/// clamped.
pub fn diverging_color(value: f64) -> RGBColor {
    let v = value.clamp(-1.0, 1.0);
    let blend = |from: u8, to: u8, t: f64| -> u8 {
        (from as f64 + (to as f64 - from as f64) * t).round() as u8
    };
    if v < 0.0 {
        let t = -v;
        RGBColor(
            blend(0xFF, NATURE_BLUE.0, t),
            blend(0xFF, NATURE_BLUE.1, t),
            blend(0xFF, NATURE_BLUE.2, t),
        )
    } else {
        RGBColor(
            blend(0xFF, NATURE_RED.0, v),
            blend(0xFF, NATURE_RED.1, v),
            blend(0xFF, NATURE_RED.2, v),
        )
    }
}

/// Pads a `[min, max]` data range by 5% on each side so marks never sit on
/// the frame. Degenerate ranges get a unit of breathing room.
pub fn padded_range(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let span = max - min;
    if span.abs() <= f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        (min - span * 0.05, max + span * 0.05)
    }
}
