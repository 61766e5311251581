//! Color parsing for style configs.
//!
//! Accepts `#RGB`, `#RRGGBB`, bare `RRGGBB` and the CSS names generated into
//! the build-time table from `named_colors.txt`.

use crate::errors::ConfigError;

include!(concat!(env!("OUT_DIR"), "/colors.rs"));

/// An opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// SVG paint value, e.g. `rgb(255,255,255)`.
    pub fn to_svg(self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Looks up the hex value of a CSS color name (case-insensitive).
pub fn get_color(name: &str) -> Option<String> {
    COLORS
        .get(name.to_ascii_lowercase().as_str())
        .map(|s| s.to_string())
}

pub fn count_colors() -> usize {
    COLORS.len()
}

/// Parses a color string from a style config.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidColor`] for anything that is neither a hex
/// triplet nor a known color name.
pub fn parse_color(input: &str) -> Result<Rgb, ConfigError> {
    let trimmed = input.trim();
    let invalid = || ConfigError::InvalidColor(input.to_string());

    if let Some(hex) = get_color(trimmed) {
        return parse_hex(hex.trim_start_matches('#')).ok_or_else(invalid);
    }

    parse_hex(trimmed.strip_prefix('#').unwrap_or(trimmed)).ok_or_else(invalid)
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    match hex.len() {
        3 => {
            let mut channels = hex.chars().map(|c| {
                let v = c.to_digit(16).unwrap_or(0) as u8;
                v * 17
            });
            Some(Rgb::new(channels.next()?, channels.next()?, channels.next()?))
        }
        6 => Some(Rgb::new(
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        )),
        _ => None,
    }
}
