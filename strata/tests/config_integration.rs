//! Integration tests for loader configuration.
//!
//! Tests that modify environment variables are marked with `#[serial]` so
//! they run one at a time; the environment is process-global.

mod common;

use std::env;
use std::path::PathBuf;

use common::{fixture_path, Hierarchy};
use serial_test::serial;
use strata::config::environment::{
    ENV_FRAGMENT_DIR, ENV_FRAGMENT_PREFIX, ENV_STOP_DIR, ENV_YAML_FRAGMENTS,
};
use strata::{EnvironmentConfig, Error, Loader, LoaderConfig, Value};

// ============================================================================
// Test Utilities
// ============================================================================

/// RAII guard for setting and restoring environment variables.
struct EnvGuard {
    key: String,
    old_value: Option<String>,
}

impl EnvGuard {
    fn new(key: &str, value: &str) -> Self {
        let old_value = env::var(key).ok();
        env::set_var(key, value);
        Self {
            key: key.to_string(),
            old_value,
        }
    }

    fn remove(key: &str) -> Self {
        let old_value = env::var(key).ok();
        env::remove_var(key);
        Self {
            key: key.to_string(),
            old_value,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.old_value {
            Some(val) => env::set_var(&self.key, val),
            None => env::remove_var(&self.key),
        }
    }
}

fn clear_strata_env_vars() -> Vec<EnvGuard> {
    [ENV_FRAGMENT_PREFIX, ENV_FRAGMENT_DIR, ENV_YAML_FRAGMENTS, ENV_STOP_DIR]
        .iter()
        .map(|k| EnvGuard::remove(k))
        .collect()
}

// ============================================================================
// Configuration files
// ============================================================================

#[test]
fn test_config_file_fixture() {
    let config = LoaderConfig::from_yaml_file(&fixture_path("configs/strata.yaml")).unwrap();
    assert_eq!(config.fragment_prefix, "course_data");
    assert_eq!(config.fragment_dir, "CourseData");
    assert!(!config.yaml_fragments);
    assert!(config.stop_dir.is_none());
}

#[test]
fn test_config_file_unknown_field() {
    let err =
        LoaderConfig::from_yaml_file(&fixture_path("configs/invalid_field.yaml")).unwrap_err();
    assert!(matches!(err, Error::Yaml { .. }));
}

#[test]
fn test_custom_names_drive_discovery() {
    let tree = Hierarchy::new();
    tree.fragment("CourseData/course_data_a.strata", "{ from: 'reserved', reserved: true }");
    tree.fragment("course_data.strata", "{ from: 'own' }");
    tree.fragment("course_data.yaml", "yaml: true\n");
    tree.fragment("strata_data.strata", "{ default_name: true }");

    let config = LoaderConfig::from_yaml_file(&fixture_path("configs/strata.yaml")).unwrap();
    let (loader, _) = tree.loader();
    let root = loader
        .with_config(config)
        .with_stop_dir(tree.path())
        .load(tree.path())
        .unwrap();

    assert_eq!(root.get("from").unwrap(), Value::from("own"));
    assert_eq!(root.get("reserved").unwrap(), Value::from(true));
    assert!(!root.contains("yaml"));
    assert!(!root.contains("default_name"));
}

#[test]
fn test_invalid_config_rejected_at_load() {
    let tree = Hierarchy::new();
    let config = LoaderConfig {
        fragment_dir: "a/b".into(),
        ..Default::default()
    };
    let err = Loader::new().with_config(config).load(tree.path()).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "fragment_dir"));
}

// ============================================================================
// Environment overrides
// ============================================================================

#[test]
#[serial]
fn test_loader_from_environment() {
    let _guards = clear_strata_env_vars();
    let tree = Hierarchy::new();
    tree.fragment("strata_data.strata", "{ top: true }");
    tree.fragment("x/env_data.strata", "{ x: true }");
    tree.fragment("x/env_data.yaml", "yaml: true\n");
    let leaf = tree.dir("x/y");

    let _prefix = EnvGuard::new(ENV_FRAGMENT_PREFIX, "env_data");
    let _yaml = EnvGuard::new(ENV_YAML_FRAGMENTS, "no");
    let _stop = EnvGuard::new(ENV_STOP_DIR, tree.path().join("x").to_str().unwrap());

    let loader = Loader::from_environment().unwrap();
    assert_eq!(loader.config().stop_dir, Some(tree.path().join("x")));
    let root = loader.load(&leaf).unwrap();
    assert!(root.contains("x"));
    assert!(!root.contains("yaml"));
    assert!(!root.contains("top"));
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let _guards = clear_strata_env_vars();
    let _dir = EnvGuard::new(ENV_FRAGMENT_DIR, "EnvData");

    let mut config = LoaderConfig::from_yaml_file(&fixture_path("configs/strata.yaml")).unwrap();
    EnvironmentConfig::apply_overrides(&mut config).unwrap();
    assert_eq!(config.fragment_dir, "EnvData");
    assert_eq!(config.fragment_prefix, "course_data");
}

#[test]
#[serial]
fn test_invalid_environment_value() {
    let _guards = clear_strata_env_vars();
    let _yaml = EnvGuard::new(ENV_YAML_FRAGMENTS, "perhaps");

    let Err(err) = Loader::from_environment() else {
        panic!("expected an invalid boolean to be rejected");
    };
    assert!(matches!(err, Error::Validation { ref field, .. } if field == ENV_YAML_FRAGMENTS));
}

#[test]
#[serial]
fn test_empty_environment_keeps_defaults() {
    let _guards = clear_strata_env_vars();
    let loader = Loader::from_environment().unwrap();
    assert_eq!(loader.config(), &LoaderConfig::default());
    assert_eq!(loader.config().stop_dir, None::<PathBuf>);
}
