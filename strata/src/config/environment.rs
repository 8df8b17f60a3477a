//! Environment variable overrides for loader configuration.
//!
//! `STRATA_*` variables take precedence over configuration files.

use std::env;
use std::path::PathBuf;

use crate::config::schema::LoaderConfig;
use crate::error::{Error, Result};

/// Overrides the fragment file-name prefix.
pub const ENV_FRAGMENT_PREFIX: &str = "STRATA_FRAGMENT_PREFIX";
/// Overrides the reserved fragments sub-directory name.
pub const ENV_FRAGMENT_DIR: &str = "STRATA_FRAGMENT_DIR";
/// Enables or disables YAML fragments.
pub const ENV_YAML_FRAGMENTS: &str = "STRATA_YAML_FRAGMENTS";
/// Sets the stop directory.
pub const ENV_STOP_DIR: &str = "STRATA_STOP_DIR";

/// Handles environment variable overrides for configuration.
///
/// # Examples
///
/// ```no_run
/// use strata::config::{EnvironmentConfig, LoaderConfig};
///
/// let mut config = LoaderConfig::default();
/// EnvironmentConfig::apply_overrides(&mut config).unwrap();
/// ```
pub struct EnvironmentConfig;

impl EnvironmentConfig {
    /// Apply `STRATA_*` overrides to `config`, then validate it.
    ///
    /// An empty `STRATA_STOP_DIR` clears the stop directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a variable holds an invalid value.
    pub fn apply_overrides(config: &mut LoaderConfig) -> Result<()> {
        if let Ok(prefix) = env::var(ENV_FRAGMENT_PREFIX) {
            config.fragment_prefix = prefix;
        }

        if let Ok(dir) = env::var(ENV_FRAGMENT_DIR) {
            config.fragment_dir = dir;
        }

        if let Ok(val) = env::var(ENV_YAML_FRAGMENTS) {
            config.yaml_fragments = Self::parse_bool(ENV_YAML_FRAGMENTS, &val)?;
        }

        if let Ok(dir) = env::var(ENV_STOP_DIR) {
            config.stop_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }

        config.validate()
    }

    /// Parse a boolean from an environment variable value.
    fn parse_bool(field: &str, s: &str) -> Result<bool> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(Error::Validation {
                field: field.into(),
                message: format!(
                    "Invalid boolean value: '{s}' (expected true/false/1/0/yes/no/on/off)"
                ),
            }),
        }
    }
}
