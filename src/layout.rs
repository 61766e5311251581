//! Badge placement on the canvas.
//!
//! All spacing is a fraction of the shorter canvas side so that a thumbnail
//! and a full-resolution export of the same template look the same.

use crate::style::{CustomPosition, Position};

/// Edge padding as a fraction of the shorter canvas side (30px at 600x600).
pub const EDGE_PADDING_RATIO: f32 = 0.05;

/// Chip inner padding as a fraction of the shorter canvas side (15px at 600x600).
pub const CHIP_PADDING_RATIO: f32 = 0.025;

/// Navigation caption font size as a fraction of the shorter canvas side (24px at 600x600).
pub const NAVIGATION_FONT_RATIO: f32 = 0.04;

/// Horizontal text alignment relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    /// SVG `text-anchor` value.
    pub fn svg_anchor(self) -> &'static str {
        match self {
            TextAlign::Left => "start",
            TextAlign::Center => "middle",
            TextAlign::Right => "end",
        }
    }
}

/// Vertical text alignment relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    Top,
    Middle,
    Bottom,
}

impl Baseline {
    /// SVG `dominant-baseline` value.
    pub fn svg_baseline(self) -> &'static str {
        match self {
            Baseline::Top => "text-before-edge",
            Baseline::Middle => "central",
            Baseline::Bottom => "text-after-edge",
        }
    }
}

/// Resolved anchor point and alignment for the badge text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
    pub align: TextAlign,
    pub baseline: Baseline,
}

fn shorter_side(width: u32, height: u32) -> f32 {
    width.min(height) as f32
}

pub fn edge_padding(width: u32, height: u32) -> f32 {
    shorter_side(width, height) * EDGE_PADDING_RATIO
}

pub fn chip_padding(width: u32, height: u32) -> f32 {
    shorter_side(width, height) * CHIP_PADDING_RATIO
}

pub fn navigation_font_size(width: u32, height: u32) -> f32 {
    shorter_side(width, height) * NAVIGATION_FONT_RATIO
}

/// Resolves where the badge text is anchored.
///
/// Presets are anchored to an edge or corner at [`edge_padding`]; `custom`
/// places the text centre at the given fractions of the canvas.
pub fn resolve(width: u32, height: u32, position: Position, custom: CustomPosition) -> Anchor {
    let w = width as f32;
    let h = height as f32;
    let p = edge_padding(width, height);

    match position {
        Position::TopLeft => Anchor {
            x: p,
            y: p,
            align: TextAlign::Left,
            baseline: Baseline::Top,
        },
        Position::TopRight => Anchor {
            x: w - p,
            y: p,
            align: TextAlign::Right,
            baseline: Baseline::Top,
        },
        Position::BottomLeft => Anchor {
            x: p,
            y: h - p,
            align: TextAlign::Left,
            baseline: Baseline::Bottom,
        },
        Position::BottomRight => Anchor {
            x: w - p,
            y: h - p,
            align: TextAlign::Right,
            baseline: Baseline::Bottom,
        },
        Position::Center => Anchor {
            x: w / 2.0,
            y: h / 2.0,
            align: TextAlign::Center,
            baseline: Baseline::Middle,
        },
        Position::Custom => {
            let custom = custom.clamped();
            Anchor {
                x: custom.x * w,
                y: custom.y * h,
                align: TextAlign::Center,
                baseline: Baseline::Middle,
            }
        }
    }
}
