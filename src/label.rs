//! Episode label formatting.

use crate::style::{BonusMode, LabelFormat, StyleConfig};

const DEFAULT_BONUS_LABEL: &str = "Bonus";

/// Formats the badge text for an episode.
///
/// Bonus episodes are resolved first: `none` renders only the bonus label,
/// `separate` renders `prefix + label + " " + number + suffix`, and
/// `included` falls through to the regular label format.
///
/// # Examples
///
/// ```
/// use coverstamp::label::format_label;
/// use coverstamp::style::{LabelFormat, StyleConfig};
///
/// let style = StyleConfig { label_format: LabelFormat::Ep, ..StyleConfig::default() };
/// assert_eq!(format_label("42", false, &style), "Ep. 42");
/// ```
pub fn format_label(number: &str, bonus: bool, style: &StyleConfig) -> String {
    if bonus {
        match style.bonus_mode {
            BonusMode::None => return bonus_label(style).to_string(),
            BonusMode::Separate => {
                return format!(
                    "{}{} {}{}",
                    style.bonus_prefix,
                    bonus_label(style),
                    number,
                    style.bonus_suffix
                )
            }
            BonusMode::Included => {}
        }
    }

    match style.label_format {
        LabelFormat::Number => number.to_string(),
        LabelFormat::Ep => format!("Ep. {}", number),
        LabelFormat::Episode => format!("Episode {}", number),
        LabelFormat::Custom => format!("{}{}{}", style.custom_prefix, number, style.custom_suffix),
    }
}

fn bonus_label(style: &StyleConfig) -> &str {
    if style.bonus_label.is_empty() {
        DEFAULT_BONUS_LABEL
    } else {
        &style.bonus_label
    }
}
