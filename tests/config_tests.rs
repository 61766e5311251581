use coverstamp::config::{CliOverrides, Config};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn test_defaults() {
    let config = Config::load_with(None, env_from(&[]));

    assert_eq!(config.default_host(), IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    assert_eq!(config.default_port(), 8080);
    assert_eq!(config.concurrency(), 1);
    assert_eq!(config.storage.data_dir, PathBuf::from("coverstamp-data"));
    assert_eq!(config.storage.storage_dir, PathBuf::from("coverstamp-data/public"));
    assert!(config.storage.public_url.is_none());
    assert!(config.storage.endpoint.is_none());
    assert_eq!(config.http.request_timeout, Duration::from_secs(30));
    assert!(config.http.font_dir.is_none());
}

#[test]
fn test_environment_variables() {
    let config = Config::load_with(
        None,
        env_from(&[
            ("COVERSTAMP_DATA_DIR", "/srv/coverstamp"),
            ("COVERSTAMP_PUBLIC_URL", "https://cdn.test/art"),
            ("COVERSTAMP_STORAGE_ENDPOINT", "https://upload.test"),
            ("COVERSTAMP_STORAGE_TOKEN", "secret"),
            ("COVERSTAMP_CONCURRENCY", "4"),
            ("PORT", "9090"),
        ]),
    );

    assert_eq!(config.storage.data_dir, PathBuf::from("/srv/coverstamp"));
    assert_eq!(config.storage.storage_dir, PathBuf::from("/srv/coverstamp/public"));
    assert_eq!(config.storage.public_url.as_deref(), Some("https://cdn.test/art"));
    assert_eq!(config.storage.endpoint.as_deref(), Some("https://upload.test"));
    assert_eq!(config.storage.token.as_deref(), Some("secret"));
    assert_eq!(config.concurrency(), 4);
    assert_eq!(config.default_port(), 9090);
}

#[test]
fn test_explicit_storage_dir_wins_over_data_dir() {
    let config = Config::load_with(
        None,
        env_from(&[
            ("COVERSTAMP_DATA_DIR", "/data"),
            ("COVERSTAMP_STORAGE_DIR", "/var/www/art"),
        ]),
    );

    assert_eq!(config.storage.data_dir, PathBuf::from("/data"));
    assert_eq!(config.storage.storage_dir, PathBuf::from("/var/www/art"));
}

#[test]
fn test_cli_overrides_take_precedence() {
    let overrides = CliOverrides {
        data_dir: Some(PathBuf::from("cli-data")),
        public_url: Some("https://cli.test".to_string()),
        concurrency: Some(2),
        port: Some(7000),
        font_dir: Some(PathBuf::from("fonts")),
        ..CliOverrides::default()
    };
    let config = Config::load_with(
        Some(overrides),
        env_from(&[
            ("COVERSTAMP_DATA_DIR", "/env-data"),
            ("COVERSTAMP_PUBLIC_URL", "https://env.test"),
            ("COVERSTAMP_CONCURRENCY", "8"),
            ("PORT", "9090"),
        ]),
    );

    assert_eq!(config.storage.data_dir, PathBuf::from("cli-data"));
    assert_eq!(config.storage.storage_dir, PathBuf::from("cli-data/public"));
    assert_eq!(config.storage.public_url.as_deref(), Some("https://cli.test"));
    assert_eq!(config.concurrency(), 2);
    assert_eq!(config.default_port(), 7000);
    assert_eq!(config.http.font_dir, Some(PathBuf::from("fonts")));
}

#[test]
fn test_invalid_values_are_ignored() {
    let config = Config::load_with(
        None,
        env_from(&[
            ("COVERSTAMP_CONCURRENCY", "many"),
            ("PORT", "70000"),
            ("COVERSTAMP_PUBLIC_URL", "  "),
            ("COVERSTAMP_STORAGE_TOKEN", ""),
        ]),
    );

    assert_eq!(config.concurrency(), 1);
    assert_eq!(config.default_port(), 8080);
    assert!(config.storage.public_url.is_none());
    assert!(config.storage.token.is_none());
}

#[test]
fn test_zero_concurrency_is_clamped() {
    let config = Config::load_with(None, env_from(&[("COVERSTAMP_CONCURRENCY", "0")]));
    assert_eq!(config.concurrency(), 1);
}

#[test]
fn test_sync_interval() {
    let default = Config::load_with(None, env_from(&[]));
    assert_eq!(default.sync.interval, Some(Duration::from_secs(3600)));

    let test_cases = [
        ("120", Some(Duration::from_secs(120))),
        ("0", None),
        ("soon", Some(Duration::from_secs(3600))),
    ];

    for (value, expected) in test_cases {
        let config = Config::load_with(None, env_from(&[("COVERSTAMP_SYNC_INTERVAL", value)]));
        assert_eq!(config.sync.interval, expected, "COVERSTAMP_SYNC_INTERVAL={}", value);
    }
}
