use coverstamp::errors::ConfigError;
use coverstamp::style::{
    BonusMode, CustomPosition, LabelFormat, NavigationPosition, NavigationStyle, Position,
    StyleConfig,
};

#[test]
fn test_defaults() {
    let style = StyleConfig::default();

    assert_eq!(style.position, Position::TopRight);
    assert_eq!(style.font_size, 120.0);
    assert_eq!(style.font_family, "Arial");
    assert_eq!(style.text_color, "#FFFFFF");
    assert_eq!(style.background_color, "#000000");
    assert_eq!(style.background_opacity, 0.8);
    assert_eq!(style.corner_radius, 8.0);
    assert_eq!(style.label_format, LabelFormat::Number);
    assert_eq!(style.bonus_mode, BonusMode::Included);
    assert_eq!(style.bonus_label, "Bonus");
    assert!(style.show_navigation);
    assert_eq!(style.navigation_position, NavigationPosition::BottomCenter);
    assert_eq!(style.navigation_style, NavigationStyle::Arrows);
    assert_eq!(style.custom_position, CustomPosition { x: 0.25, y: 0.25 });
}

#[test]
fn test_empty_json_is_default() {
    let style: StyleConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(style, StyleConfig::default());
}

#[test]
fn test_deserialize_camel_case() {
    let style: StyleConfig = serde_json::from_str(
        r#"{
            "position": "bottom-left",
            "fontSize": 48,
            "textColor": "gold",
            "backgroundOpacity": 0.5,
            "labelFormat": "episode",
            "bonusMode": "separate",
            "showNavigation": false,
            "navigationPosition": "top-center",
            "navigationStyle": "text",
            "customPosition": { "x": 0.1 }
        }"#,
    )
    .unwrap();

    assert_eq!(style.position, Position::BottomLeft);
    assert_eq!(style.font_size, 48.0);
    assert_eq!(style.text_color, "gold");
    assert_eq!(style.background_opacity, 0.5);
    assert_eq!(style.label_format, LabelFormat::Episode);
    assert_eq!(style.bonus_mode, BonusMode::Separate);
    assert!(!style.show_navigation);
    assert_eq!(style.navigation_position, NavigationPosition::TopCenter);
    assert_eq!(style.navigation_style, NavigationStyle::Text);
    assert_eq!(style.custom_position, CustomPosition { x: 0.1, y: 0.25 });
}

#[test]
fn test_unknown_enum_values_fall_back() {
    assert_eq!(Position::parse("middle"), Position::Center);
    assert_eq!(LabelFormat::parse("roman"), LabelFormat::Number);
    assert_eq!(BonusMode::parse("hidden"), BonusMode::Included);
    assert_eq!(NavigationPosition::parse("left"), NavigationPosition::BottomCenter);
    assert_eq!(NavigationStyle::parse("dots"), NavigationStyle::Arrows);
}

#[test]
fn test_enum_parsing_ignores_case() {
    assert_eq!(Position::parse(" Top-Left "), Position::TopLeft);
    assert_eq!(NavigationStyle::parse("BOTH"), NavigationStyle::Both);
}

#[test]
fn test_serialize_uses_kebab_case_strings() {
    let style = StyleConfig {
        position: Position::BottomRight,
        ..StyleConfig::default()
    };
    let value = serde_json::to_value(&style).unwrap();

    assert_eq!(value["position"], "bottom-right");
    assert_eq!(value["labelFormat"], "number");
    assert_eq!(value["navigationPosition"], "bottom-center");
    assert_eq!(value["fontSize"], 120.0);
}

#[test]
fn test_colors_validated() {
    let colors = StyleConfig::default().colors().unwrap();
    assert_eq!(colors.text.to_hex(), "#FFFFFF");
    assert_eq!(colors.background.to_hex(), "#000000");

    let style = StyleConfig {
        background_color: "#12345".to_string(),
        ..StyleConfig::default()
    };
    assert!(matches!(style.colors(), Err(ConfigError::InvalidColor(c)) if c == "#12345"));
}

#[test]
fn test_normalized_clamps_ranges() {
    let style = StyleConfig {
        background_opacity: 1.7,
        font_size: -3.0,
        corner_radius: f32::NAN,
        custom_position: CustomPosition { x: -1.0, y: 2.0 },
        ..StyleConfig::default()
    }
    .normalized();

    assert_eq!(style.background_opacity, 1.0);
    assert_eq!(style.font_size, 120.0);
    assert_eq!(style.corner_radius, 0.0);
    assert_eq!(style.custom_position, CustomPosition { x: 0.0, y: 1.0 });
}

#[test]
fn test_custom_position_new_clamps() {
    assert_eq!(CustomPosition::new(0.5, 1.5), CustomPosition { x: 0.5, y: 1.0 });
    assert_eq!(CustomPosition::new(f32::NAN, 0.3), CustomPosition { x: 0.0, y: 0.3 });
}
