//! Environment variable handling.

use crate::types::PacekeeperConfig;
use std::env;
use std::path::Path;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    pub const PACEKEEPER_CONFIG_DIR: &str = "PACEKEEPER_CONFIG_DIR";
    pub const PACEKEEPER_SUCCESS_DELAY_MS: &str = "PACEKEEPER_SUCCESS_DELAY_MS";
    pub const PACEKEEPER_FAILURE_DELAY_MS: &str = "PACEKEEPER_FAILURE_DELAY_MS";
    pub const PACEKEEPER_MAX_TRIES: &str = "PACEKEEPER_MAX_TRIES";
    pub const PACEKEEPER_BASE_URL: &str = "PACEKEEPER_BASE_URL";
}

/// Environment access helpers.
pub struct Environment;

impl Environment {
    /// Load `.env.local` then `.env` from `dir` into the process environment.
    ///
    /// Missing files are not an error. Variables already set are never
    /// replaced, so the real environment beats `.env.local`, which beats
    /// `.env`.
    pub fn init(dir: &Path) -> Result<(), EnvError> {
        for file in [".env.local", ".env"] {
            match dotenvy::from_path(dir.join(file)) {
                Ok(()) => {}
                Err(e) if e.not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get an integer variable.
    pub fn get_int<T: std::str::FromStr>(var: &str) -> Result<Option<T>, EnvError> {
        match env::var(var) {
            Ok(v) => v.trim().parse().map(Some).map_err(|_| EnvError::InvalidValue {
                var: var.to_string(),
                message: format!("expected integer, got {v:?}"),
            }),
            Err(_) => Ok(None),
        }
    }
}

/// Apply `PACEKEEPER_*` overrides on top of a loaded configuration.
pub fn apply_env_overrides(config: &mut PacekeeperConfig) -> Result<(), EnvError> {
    if let Some(ms) = Environment::get_int(vars::PACEKEEPER_SUCCESS_DELAY_MS)? {
        config.pacing.success_delay_ms = ms;
    }
    if let Some(ms) = Environment::get_int(vars::PACEKEEPER_FAILURE_DELAY_MS)? {
        config.pacing.failure_delay_ms = ms;
    }
    if let Some(tries) = Environment::get_int(vars::PACEKEEPER_MAX_TRIES)? {
        config.pacing.max_tries = tries;
    }
    if let Some(base_url) = Environment::get(vars::PACEKEEPER_BASE_URL) {
        config.http.base_url = Some(base_url);
    }
    Ok(())
}
