//! Tests for the logger module

use crate::logger::config::*;
use crate::logger::{LoggerError, build_layers, init_logger};
use std::path::PathBuf;

fn console_only() -> LoggerConfig {
    LoggerConfig {
        console: ConsoleConfig {
            enabled: true,
            colored: false,
        },
        file: FileConfig {
            enabled: false,
            path: PathBuf::from("test.log"),
            append: true,
            format: LogFormat::Full,
        },
        level: "info".to_string(),
    }
}

#[test]
fn test_default_config_creation() {
    let config = LoggerConfig::default();
    assert!(config.console.enabled);
    assert!(config.console.colored);
    assert!(!config.file.enabled);
    assert_eq!(config.level, "info");
}

#[test]
fn test_config_validation() {
    let mut config = console_only();
    assert!(config.validate().is_ok());

    config.console.enabled = false;
    config.file.enabled = false;
    assert!(config.validate().is_err());
}

#[test]
fn test_directive_level_is_accepted() {
    let mut config = console_only();
    config.level = "moto_repo=debug,diesel=warn".to_string();
    assert!(config.validate().is_ok());

    config.level = "moto_repo=[".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_log_format_parse() {
    assert_eq!(LogFormat::default(), LogFormat::Full);
    assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    assert_eq!(LogFormat::Compact.as_str(), "compact");
    assert!("xml".parse::<LogFormat>().is_err());
}

#[test]
fn test_file_layer_creates_parent_directory() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("moto.log");

    let mut config = console_only();
    config.file = FileConfig {
        enabled: true,
        path: path.clone(),
        append: false,
        format: LogFormat::Json,
    };

    let layers = build_layers(&config).expect("layers build");
    assert_eq!(layers.len(), 2);
    assert!(path.exists());
}

#[test]
fn test_init_twice_reports_already_initialized() {
    let first = init_logger(console_only());
    let second = init_logger(console_only());

    // Another test binary thread may have installed a subscriber first
    if first.is_ok() {
        assert!(matches!(
            second,
            Err(LoggerError::AlreadyInitialized { .. })
        ));
    } else {
        assert!(matches!(first, Err(LoggerError::AlreadyInitialized { .. })));
    }
}
