//! Style configuration applied uniformly across a batch.
//!
//! A [`StyleConfig`] is built once per render or batch call and never mutated
//! while rendering. Every enumerated field is read from its string form and
//! falls back to a safe value when the string is not recognized, so a template
//! written by an older or newer editor still renders.

use crate::colors::{parse_color, Rgb};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// Declares a string-backed enum with a fallback for unrecognized values.
macro_rules! lenient_enum {
    (
        $(#[$meta:meta])*
        $name:ident, fallback = $fallback:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "&'static str")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parses the string form, falling back for unknown values.
            pub fn parse(value: &str) -> Self {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($text => $name::$variant,)+
                    _ => $name::$fallback,
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::parse(&value)
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

lenient_enum! {
    /// Where the badge sits on the canvas.
    Position, fallback = Center {
        TopLeft => "top-left",
        TopRight => "top-right",
        BottomLeft => "bottom-left",
        BottomRight => "bottom-right",
        Center => "center",
        Custom => "custom",
    }
}

lenient_enum! {
    /// How a regular episode number is labeled.
    LabelFormat, fallback = Number {
        Number => "number",
        Ep => "ep",
        Episode => "episode",
        Custom => "custom",
    }
}

lenient_enum! {
    /// How bonus episodes are labeled.
    BonusMode, fallback = Included {
        Included => "included",
        Separate => "separate",
        None => "none",
    }
}

lenient_enum! {
    NavigationPosition, fallback = BottomCenter {
        TopCenter => "top-center",
        BottomCenter => "bottom-center",
    }
}

lenient_enum! {
    NavigationStyle, fallback = Arrows {
        Arrows => "arrows",
        Text => "text",
        Both => "both",
    }
}

/// Custom badge position as fractions of the canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomPosition {
    pub x: f32,
    pub y: f32,
}

impl Default for CustomPosition {
    fn default() -> Self {
        Self { x: 0.25, y: 0.25 }
    }
}

impl CustomPosition {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }.clamped()
    }

    /// Both fractions forced into `[0, 1]`; NaN becomes 0.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_unit(self.x),
            y: clamp_unit(self.y),
        }
    }
}

/// The full set of styling and labeling options for one render or batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleConfig {
    pub position: Position,
    pub custom_position: CustomPosition,
    pub font_size: f32,
    pub font_family: String,
    pub text_color: String,
    pub background_color: String,
    pub background_opacity: f32,
    pub corner_radius: f32,
    pub label_format: LabelFormat,
    pub custom_prefix: String,
    pub custom_suffix: String,
    pub bonus_mode: BonusMode,
    pub bonus_label: String,
    pub bonus_prefix: String,
    pub bonus_suffix: String,
    pub show_navigation: bool,
    pub navigation_position: NavigationPosition,
    pub navigation_style: NavigationStyle,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            position: Position::TopRight,
            custom_position: CustomPosition::default(),
            font_size: 120.0,
            font_family: "Arial".to_string(),
            text_color: "#FFFFFF".to_string(),
            background_color: "#000000".to_string(),
            background_opacity: 0.8,
            corner_radius: 8.0,
            label_format: LabelFormat::Number,
            custom_prefix: String::new(),
            custom_suffix: String::new(),
            bonus_mode: BonusMode::Included,
            bonus_label: "Bonus".to_string(),
            bonus_prefix: String::new(),
            bonus_suffix: String::new(),
            show_navigation: true,
            navigation_position: NavigationPosition::BottomCenter,
            navigation_style: NavigationStyle::Arrows,
        }
    }
}

/// Text and chip colors parsed from a [`StyleConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleColors {
    pub text: Rgb,
    pub background: Rgb,
}

impl StyleConfig {
    /// Parses both colors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidColor`] naming the first color that
    /// cannot be parsed.
    pub fn colors(&self) -> Result<StyleColors, ConfigError> {
        Ok(StyleColors {
            text: parse_color(&self.text_color)?,
            background: parse_color(&self.background_color)?,
        })
    }

    /// Returns a copy with numeric fields forced into their valid ranges.
    pub fn normalized(&self) -> Self {
        let mut style = self.clone();
        style.custom_position = style.custom_position.clamped();
        style.background_opacity = clamp_unit(style.background_opacity);
        if !style.font_size.is_finite() || style.font_size <= 0.0 {
            style.font_size = StyleConfig::default().font_size;
        }
        if !style.corner_radius.is_finite() || style.corner_radius < 0.0 {
            style.corner_radius = 0.0;
        }
        style
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
