use coverstamp::label::format_label;
use coverstamp::style::{BonusMode, LabelFormat, StyleConfig};

fn style(label_format: LabelFormat, bonus_mode: BonusMode) -> StyleConfig {
    StyleConfig {
        label_format,
        bonus_mode,
        ..StyleConfig::default()
    }
}

#[test]
fn test_label_formats() {
    let test_cases = [
        (LabelFormat::Number, "7"),
        (LabelFormat::Ep, "Ep. 7"),
        (LabelFormat::Episode, "Episode 7"),
    ];

    for (format, expected) in test_cases {
        assert_eq!(format_label("7", false, &style(format, BonusMode::Included)), expected);
    }
}

#[test]
fn test_custom_format_wraps_number() {
    let style = StyleConfig {
        label_format: LabelFormat::Custom,
        custom_prefix: "S1E".to_string(),
        custom_suffix: "!".to_string(),
        ..StyleConfig::default()
    };

    assert_eq!(format_label("12", false, &style), "S1E12!");
}

#[test]
fn test_custom_format_with_empty_affixes_is_bare_number() {
    let style = style(LabelFormat::Custom, BonusMode::Included);
    assert_eq!(format_label("12", false, &style), "12");
}

#[test]
fn test_unknown_format_falls_back_to_number() {
    let style: StyleConfig = serde_json::from_str(r#"{"labelFormat": "roman"}"#).unwrap();
    assert_eq!(style.label_format, LabelFormat::Number);
    assert_eq!(format_label("9", false, &style), "9");
}

#[test]
fn test_number_is_rendered_verbatim() {
    let style = style(LabelFormat::Ep, BonusMode::Included);
    assert_eq!(format_label("007", false, &style), "Ep. 007");
    assert_eq!(format_label("12b", false, &style), "Ep. 12b");
}

#[test]
fn test_bonus_none_renders_only_the_label() {
    for format in [LabelFormat::Number, LabelFormat::Ep, LabelFormat::Episode, LabelFormat::Custom] {
        let style = StyleConfig {
            bonus_label: "Extra".to_string(),
            ..style(format, BonusMode::None)
        };
        assert_eq!(format_label("3", true, &style), "Extra");
    }
}

#[test]
fn test_bonus_none_with_empty_label_uses_default() {
    let style = StyleConfig {
        bonus_label: String::new(),
        ..style(LabelFormat::Number, BonusMode::None)
    };
    assert_eq!(format_label("3", true, &style), "Bonus");
}

#[test]
fn test_bonus_separate() {
    let style = style(LabelFormat::Ep, BonusMode::Separate);
    assert_eq!(format_label("3", true, &style), "Bonus 3");
}

#[test]
fn test_bonus_separate_with_affixes() {
    let style = StyleConfig {
        bonus_label: "Special".to_string(),
        bonus_prefix: "[".to_string(),
        bonus_suffix: "]".to_string(),
        ..style(LabelFormat::Number, BonusMode::Separate)
    };
    assert_eq!(format_label("4", true, &style), "[Special 4]");
}

#[test]
fn test_bonus_included_uses_regular_format() {
    let style = style(LabelFormat::Episode, BonusMode::Included);
    assert_eq!(format_label("5", true, &style), "Episode 5");
}

#[test]
fn test_bonus_mode_ignored_for_regular_episodes() {
    for mode in [BonusMode::None, BonusMode::Separate] {
        assert_eq!(format_label("5", false, &style(LabelFormat::Ep, mode)), "Ep. 5");
    }
}
