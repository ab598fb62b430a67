//! Integration tests for configuration loading

use bus_times::infra::Config;
use bus_times::services::TransitDirectory;
use bus_times::domain::{RouteCode, StopCode};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[server]
bind_address = "127.0.0.1"
port = 9191

[transloc]
base_url = "http://localhost:9000"
agency = "42"
api_key_header = "X-Api-Key"
api_key = "from-file"

[stops]
West = 100
"Science Drive" = 101

[routes]
C1 = 200

[speech]
unavailable_message = "Nothing right now."

[metrics]
interval_secs = 15
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.bind_address(), "127.0.0.1");
    assert_eq!(config.port(), 9191);
    assert_eq!(config.transloc_base_url(), "http://localhost:9000");
    assert_eq!(config.transloc_agency(), "42");
    assert_eq!(config.transloc_api_key_header(), "X-Api-Key");
    assert_eq!(config.transloc_api_key(), Some("from-file"));
    assert_eq!(config.unavailable_message(), "Nothing right now.");
    assert_eq!(config.metrics_interval_secs(), 15);

    let directory = TransitDirectory::from_config(&config);
    assert_eq!(directory.stop_code("west"), Some(StopCode(100)));
    assert_eq!(directory.stop_code("science drive"), Some(StopCode(101)));
    assert_eq!(directory.route_code("c1"), Some(RouteCode(200)));
    assert_eq!(directory.route_code("ccx"), None);
}

#[test]
fn test_minimal_file_uses_section_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[stops]\neast = 1\n").unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.port(), 8080);
    assert_eq!(config.transloc_api_key_header(), "X-Mashape-Key");
    assert_eq!(config.transloc_api_key(), None);
    assert_eq!(config.stops().len(), 1);
    assert!(config.routes().is_empty());
}

#[test]
fn test_invalid_file_is_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[stops]\neast = \"not a number\"\n").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.config_file(), "default");
    assert_eq!(config.port(), 8080);
    assert!(config.stops().contains_key("east"));
}
