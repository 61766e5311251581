//! The episode badge: a rounded, alpha-blended chip with the label on top.

use crate::colors::Rgb;
use crate::image::{escape_xml, font_stack, Rasterizer, TextMetrics};
use crate::layout::{Anchor, Baseline, TextAlign};
use crate::style::{StyleColors, StyleConfig};

/// Background rectangle behind the label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chip {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub radius: f32,
    pub color: Rgb,
    pub opacity: f32,
}

/// A fully laid out badge, ready to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub label: String,
    pub anchor: Anchor,
    pub font_size: f32,
    pub font_family: String,
    pub text_color: Rgb,
    pub chip: Option<Chip>,
}

/// Chip colors and shape, already validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChipStyle {
    pub color: Rgb,
    pub opacity: f32,
    pub radius: f32,
    pub padding: f32,
}

/// Places the chip around the measured label.
///
/// The chip is the text box grown by `padding` on every side and shifted so
/// that it follows the text alignment: right-aligned text grows the chip to
/// the left of the anchor, bottom-aligned text grows it upwards, and centered
/// text grows it symmetrically. An opacity of zero yields no chip.
pub fn layout_chip(anchor: &Anchor, metrics: TextMetrics, style: ChipStyle) -> Option<Chip> {
    if style.opacity <= 0.0 {
        return None;
    }

    let p = style.padding;
    let width = metrics.width + 2.0 * p;
    let height = metrics.height + 2.0 * p;

    let x = match anchor.align {
        TextAlign::Left => anchor.x - p,
        TextAlign::Center => anchor.x - metrics.width / 2.0 - p,
        TextAlign::Right => anchor.x - metrics.width - p,
    };

    let y = match anchor.baseline {
        Baseline::Top => anchor.y - p,
        Baseline::Middle => anchor.y - metrics.height / 2.0 - p,
        Baseline::Bottom => anchor.y - metrics.height - p,
    };

    Some(Chip {
        x,
        y,
        width,
        height,
        radius: style.radius.min(width.min(height) / 2.0).max(0.0),
        color: style.color,
        opacity: style.opacity.min(1.0),
    })
}

/// Measures the label with the rasterizer's fonts and lays out the badge.
pub fn layout_badge(
    rasterizer: &Rasterizer,
    label: String,
    anchor: Anchor,
    style: &StyleConfig,
    colors: StyleColors,
    chip_padding: f32,
) -> Badge {
    let metrics = rasterizer.measure_text(&label, &style.font_family, style.font_size);
    let chip = layout_chip(
        &anchor,
        metrics,
        ChipStyle {
            color: colors.background,
            opacity: style.background_opacity,
            radius: style.corner_radius,
            padding: chip_padding,
        },
    );

    Badge {
        label,
        anchor,
        font_size: style.font_size,
        font_family: style.font_family.clone(),
        text_color: colors.text,
        chip,
    }
}

impl Badge {
    /// SVG fragment drawing the chip (if any) followed by the label.
    pub fn to_svg(&self) -> String {
        let mut svg = String::with_capacity(512);

        if let Some(chip) = &self.chip {
            svg.push_str(&format!(
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="{:.2}" ry="{:.2}" fill="{}" fill-opacity="{:.3}"/>"#,
                chip.x,
                chip.y,
                chip.width,
                chip.height,
                chip.radius,
                chip.radius,
                chip.color.to_svg(),
                chip.opacity,
            ));
        }

        svg.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" text-anchor="{}" dominant-baseline="{}" font-family="{}" font-size="{:.2}" font-weight="bold" fill="{}">{}</text>"#,
            self.anchor.x,
            self.anchor.y,
            self.anchor.align.svg_anchor(),
            self.anchor.baseline.svg_baseline(),
            escape_xml(&font_stack(&self.font_family)),
            self.font_size,
            self.text_color.to_svg(),
            escape_xml(&self.label),
        ));

        svg
    }
}
