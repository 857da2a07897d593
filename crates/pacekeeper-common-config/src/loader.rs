//! Configuration file loading and parsing.

use crate::env::{apply_env_overrides, vars, EnvError, Environment};
use crate::types::PacekeeperConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Location of the config file relative to the project directory.
pub const CONFIG_FILE: &str = ".pacekeeper/config.yaml";

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern is valid"));

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", display_line(*line))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },

    #[error(transparent)]
    Env(#[from] EnvError),
}

fn display_line(line: Option<usize>) -> String {
    line.map_or_else(|| "unknown".to_string(), |l| l.to_string())
}

/// Configuration loader.
pub struct ConfigLoader {
    base_path: PathBuf,
    env_overrides: bool,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
            env_overrides: true,
        }
    }

    /// Skip `.env` loading and `PACEKEEPER_*` overrides.
    pub fn without_env_overrides(mut self) -> Self {
        self.env_overrides = false;
        self
    }

    /// Path of the config file this loader reads.
    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(CONFIG_FILE)
    }

    /// Load configuration, falling back to defaults when no file exists.
    ///
    /// With overrides enabled, `.env.local` and `.env` in the project
    /// directory are loaded first, so their variables feed both `${VAR}`
    /// expansion and the `PACEKEEPER_*` overrides.
    pub fn load(&self) -> Result<PacekeeperConfig, ConfigError> {
        if self.env_overrides {
            Environment::init(&self.base_path)?;
        }

        let config_path = self.config_path();

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            Self::parse(&contents)?
        } else {
            PacekeeperConfig::default()
        };

        if self.env_overrides {
            apply_env_overrides(&mut config)?;
        }

        validate(&config)?;
        Ok(config)
    }

    /// Parse YAML text after `${VAR}` expansion. Does not validate.
    pub fn parse(contents: &str) -> Result<PacekeeperConfig, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        let dir = Environment::get(vars::PACEKEEPER_CONFIG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
        Self::new(dir)
    }
}

/// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut result = content.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(content) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let var_name = &cap[1];
        let default = cap.get(2).map(|m| m.as_str());

        let value = match (std::env::var(var_name), default) {
            (Ok(v), _) => v,
            (Err(_), Some(d)) => d.to_string(),
            (Err(_), None) => {
                return Err(ConfigError::EnvVarNotFound {
                    var: var_name.to_string(),
                })
            }
        };

        result = result.replace(full_match.as_str(), &value);
    }

    Ok(result)
}

/// Validate configuration values.
pub fn validate(config: &PacekeeperConfig) -> Result<(), ConfigError> {
    if config.pacing.max_tries == 0 {
        return Err(ConfigError::ValidationError {
            message: "pacing.max_tries must be greater than 0".to_string(),
        });
    }

    if config.http.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            message: "http.request_timeout_secs must be greater than 0".to_string(),
        });
    }

    if let Some(base_url) = &config.http.base_url {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError {
                message: format!("http.base_url must be an http(s) URL, got {base_url:?}"),
            });
        }
    }

    Ok(())
}
