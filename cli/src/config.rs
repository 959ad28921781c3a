use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use weave::{DEFAULT_MAX_DEPTH, WeaveOptions};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "litorg.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config file at {config_path}: {reason}")]
    Invalid { config_path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Recursion ceiling for resolution and weaving.
    pub max_depth: usize,
    /// Exit with status 1 after printing the `#error` line.
    pub fail_on_error: bool,
    /// Template for external references; `{}` is replaced by the reference.
    pub include_format: String,
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        let options = WeaveOptions::default();
        Config {
            max_depth: DEFAULT_MAX_DEPTH,
            fail_on_error: false,
            include_format: options.include_format,
            color: true,
        }
    }
}

impl Config {
    /// Load `config_path`; a missing file yields the defaults.
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            log::debug!("no config at {}, using defaults", config_path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        if config.max_depth == 0 {
            return Err(ConfigError::Invalid {
                config_path: config_path.to_path_buf(),
                reason: "max_depth must be positive".to_string(),
            });
        }
        if !config.include_format.contains("{}") {
            return Err(ConfigError::Invalid {
                config_path: config_path.to_path_buf(),
                reason: "include_format must contain `{}`".to_string(),
            });
        }

        log::debug!("loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Load from an explicit path, or from `litorg.toml` in the working directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) if !path.exists() => Err(ConfigError::ConfigReadError {
                config_path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            }),
            Some(path) => Self::load_from_path(path),
            None => Self::load_from_path(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn weave_options(&self) -> WeaveOptions {
        WeaveOptions {
            max_depth: self.max_depth,
            quote: false,
            include_format: self.include_format.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from_path(dir.path().join("litorg.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_depth, 256);
        assert!(!config.fail_on_error);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::ConfigReadError { .. })
        ));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("litorg.toml");
        std::fs::write(&path, "max_depth = 32\nfail_on_error = true\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.max_depth, 32);
        assert!(config.fail_on_error);
        assert_eq!(config.include_format, "#include <{}>");
        assert_eq!(config.weave_options().max_depth, 32);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("litorg.toml");
        std::fs::write(&path, "max_dpeth = 32\n").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(ConfigError::ConfigParseError { .. })
        ));
    }

    #[test]
    fn include_format_needs_placeholder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("litorg.toml");
        std::fs::write(&path, "include_format = \"import\"\n").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
