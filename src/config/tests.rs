use std::io::Write;

use serial_test::serial;

use super::*;

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes())
        .expect("write temp config");
    file
}

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.saga.name, DEFAULT_SAGA_NAME);
    assert!(config.saga.timeout_ms.is_none());
    assert!(config.saga.timeout().is_none());
    assert_eq!(config.bus.capacity, 1024);
}

#[test]
fn test_config_for_test() {
    let config = Config::for_test();
    assert_eq!(config.saga.name, "entity-saga");
}

#[test]
fn test_saga_settings_timeout() {
    let settings = SagaSettings {
        name: "orders".to_string(),
        timeout_ms: Some(250),
    };
    assert_eq!(settings.timeout(), Some(Duration::from_millis(250)));
}

#[test]
#[serial]
fn test_load_from_path() {
    let file = write_yaml(
        "saga:\n  name: create-order\n  timeout_ms: 1500\nbus:\n  capacity: 16\n",
    );

    let config = Config::load(file.path().to_str()).unwrap();

    assert_eq!(config.saga.name, "create-order");
    assert_eq!(config.saga.timeout(), Some(Duration::from_millis(1500)));
    assert_eq!(config.bus.capacity, 16);
}

#[test]
#[serial]
fn test_partial_file_keeps_defaults() {
    let file = write_yaml("bus:\n  capacity: 8\n");

    let config = Config::load(file.path().to_str()).unwrap();

    assert_eq!(config.saga.name, DEFAULT_SAGA_NAME);
    assert_eq!(config.bus.capacity, 8);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    let result = Config::load(Some("/nonexistent/entity-saga.yaml"));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let file = write_yaml("saga:\n  name: from-file\n");
    std::env::set_var("ENTITY_SAGA__SAGA__NAME", "from-env");

    let config = Config::load(file.path().to_str());
    std::env::remove_var("ENTITY_SAGA__SAGA__NAME");

    assert_eq!(config.unwrap().saga.name, "from-env");
}

#[test]
#[serial]
fn test_config_env_var_names_file() {
    let file = write_yaml("saga:\n  timeout_ms: 40\n");
    std::env::set_var(CONFIG_ENV_VAR, file.path());

    let config = Config::load(None);
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().saga.timeout_ms, Some(40));
}
