//! Environment configuration files

use std::fs;

use crate::common::*;
use stratagraph::{Environment, EnvironmentConfig, OfflineNetwork, StrataError, CONFIG_FILE_NAME};

#[test]
fn test_environment_from_default_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    EnvironmentConfig::write_default_if_missing(&path).unwrap();

    let env = Environment::from_config_file(OfflineNetwork, &path).unwrap();
    assert_eq!(env.config(), &EnvironmentConfig::default());
}

#[test]
fn test_environment_from_custom_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "gc_on_release = true\nsnapshot_cache_capacity = 8\n").unwrap();

    let env = Environment::from_config_file(OfflineNetwork, &path).unwrap();
    assert!(env.config().gc_on_release);
    assert_eq!(env.config().snapshot_cache_capacity, 8);
    assert_eq!(env.config().gc_interval_ms, None);
}

#[test]
fn test_invalid_interval_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "gc_interval_ms = 1\n").unwrap();

    let err = Environment::from_config_file(OfflineNetwork, &path).unwrap_err();
    assert!(matches!(err, StrataError::InvalidInput(_)));
}
