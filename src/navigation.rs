//! Optional navigation caption drawn under or above the badge.

use crate::colors::Rgb;
use crate::image::escape_xml;
use crate::layout::{edge_padding, navigation_font_size};
use crate::style::{NavigationPosition, NavigationStyle, StyleConfig};

pub const ARROWS_CAPTION: &str = "← Prev | Next →";
pub const TEXT_CAPTION: &str = "Swipe for more episodes";

const NAVIGATION_FONT: &str = "Arial, sans-serif";

/// A positioned navigation caption.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: &'static str,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub color: Rgb,
}

/// Caption text for a navigation style. `both` renders like `arrows`.
pub fn caption_text(style: NavigationStyle) -> &'static str {
    match style {
        NavigationStyle::Arrows | NavigationStyle::Both => ARROWS_CAPTION,
        NavigationStyle::Text => TEXT_CAPTION,
    }
}

/// Lays out the caption, or `None` when navigation is disabled.
pub fn layout_caption(width: u32, height: u32, style: &StyleConfig, color: Rgb) -> Option<Caption> {
    if !style.show_navigation {
        return None;
    }

    let padding = edge_padding(width, height);
    let font_size = navigation_font_size(width, height);
    let y = match style.navigation_position {
        NavigationPosition::BottomCenter => height as f32 - padding,
        NavigationPosition::TopCenter => padding + font_size,
    };

    Some(Caption {
        text: caption_text(style.navigation_style),
        x: width as f32 / 2.0,
        y,
        font_size,
        color,
    })
}

impl Caption {
    pub fn to_svg(&self) -> String {
        format!(
            r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" dominant-baseline="central" font-family="{}" font-size="{:.2}" fill="{}">{}</text>"#,
            self.x,
            self.y,
            NAVIGATION_FONT,
            self.font_size,
            self.color.to_svg(),
            escape_xml(self.text),
        )
    }
}
