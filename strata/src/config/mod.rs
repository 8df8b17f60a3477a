//! Loader configuration.
//!
//! # Configuration Precedence
//!
//! Settings are combined from the following sources (highest to lowest):
//!
//! 1. Programmatic overrides (`Loader::with_config`, `Loader::with_stop_dir`)
//! 2. Environment variables (`STRATA_*`)
//! 3. A YAML configuration file (`LoaderConfig::from_yaml_file`)
//! 4. Built-in defaults
//!
//! # Examples
//!
//! ```no_run
//! use strata::config::{EnvironmentConfig, LoaderConfig};
//! use std::path::Path;
//!
//! let mut config = LoaderConfig::from_yaml_file(Path::new("strata.yaml")).unwrap();
//! EnvironmentConfig::apply_overrides(&mut config).unwrap();
//! ```

pub mod environment;
pub mod schema;

pub use environment::EnvironmentConfig;
pub use schema::{
    LoaderConfig, DEFAULT_FRAGMENT_DIR, DEFAULT_FRAGMENT_PREFIX, SCRIPT_EXTENSION, YAML_EXTENSIONS,
};
