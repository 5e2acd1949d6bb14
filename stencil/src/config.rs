//! Configuration for the `stencil` CLI.
//!
//! An optional `stencil.toml` carrying default undefined-value-policy and
//! serializer settings, discovered the way the teacher's CLI discovers its
//! config file: current directory, then user config directory, then system
//! config directory.

use std::path::{Path, PathBuf};

use dirs::{config_dir, home_dir};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

pub const CONFIG_FILE_NAME: &str = "stencil.toml";

/// The undefined-value policy named in config, mirrored by `--strict-undefined`
/// on the command line (the flag takes precedence when both are present).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UndefinedPolicyKind {
    #[default]
    Permissive,
    Strict,
}

/// Application configuration structure for the `stencil` CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Global verbose setting; overridden by `-v`/`--verbose` when passed.
    #[serde(default)]
    pub verbose: bool,

    /// Default undefined-value policy for `render`.
    #[serde(default)]
    pub undefined_policy: UndefinedPolicyKind,

    /// Placeholder text used when `undefined_policy` names a sentinel.
    #[serde(default)]
    pub undefined_sentinel: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self { verbose: false, undefined_policy: UndefinedPolicyKind::default(), undefined_sentinel: None }
    }
}

impl Config {
    /// Loads configuration from the default search path, falling back to
    /// `Config::default()` if no file is found in any of them.
    pub fn load() -> Result<Self> {
        match Self::find_config_file()? {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::Config(format!("configuration file not found: {}", path.display())));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::Config(format!("failed to parse configuration: {e}")))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| CliError::Config(format!("failed to serialize configuration: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn check_current_dir_config() -> Option<PathBuf> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }

    fn check_home_config() -> Option<PathBuf> {
        home_dir()
            .map(|dir| dir.join(".config").join("stencil").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn check_system_config() -> Option<PathBuf> {
        config_dir()
            .map(|dir| dir.join("stencil").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn find_config_file() -> Result<Option<PathBuf>> {
        Ok(Self::check_current_dir_config().or_else(Self::check_home_config).or_else(Self::check_system_config))
    }
}
