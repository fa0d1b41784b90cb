// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::auth::{
    PasswordRequirements, DEFAULT_TOKEN_TTL_MINUTES, MAX_TOKEN_TTL_MINUTES, SESSION_IDLE_TIMEOUT,
};
use crate::error::AppError;


/// Default config file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Environment variable prefix; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "VOLUNTEER_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Directory holding `users.json`
    pub data_dir: PathBuf,
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    pub jwt: JwtSettings,
    pub session: SessionSettings,
    pub password_requirements: PasswordRequirements,
    pub username: UsernameRules,
}

/// Token signing settings
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    /// Shared HS256 secret. Required.
    pub secure_key: Option<String>,
    pub ttl_minutes: i64,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secure_key", &self.secure_key.as_ref().map(|_| "<redacted>"))
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

impl JwtSettings {
    /// The signing secret, or `ConfigurationMissing` when unset or blank
    pub fn secret(&self) -> Result<&str, AppError> {
        self.secure_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::ConfigurationMissing("jwt.secure_key".to_string()))
    }
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secure_key: None,
            ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
        }
    }
}

/// Legacy session settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub idle_timeout_secs: u64,
    pub cookie_name: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: SESSION_IDLE_TIMEOUT.as_secs(),
            cookie_name: "volunteer.session".to_string(),
        }
    }
}

impl SessionSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Username length bounds, in characters
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UsernameRules {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for UsernameRules {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 50,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_json: false,
            jwt: JwtSettings::default(),
            session: SessionSettings::default(),
            password_requirements: PasswordRequirements::default(),
            username: UsernameRules::default(),
        }
    }
}

impl Settings {
    /// Load from `config.toml` and the environment
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from the given TOML file (optional) overlaid with `VOLUNTEER_*`
    /// environment variables, then validate.
    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let settings: Settings = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), AppError> {
        self.jwt.secret()?;

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(AppError::InvalidInput(format!(
                "log_level must be one of {LOG_LEVELS:?}, got {:?}",
                self.log_level
            )));
        }

        if self.jwt.ttl_minutes <= 0 || self.jwt.ttl_minutes > MAX_TOKEN_TTL_MINUTES {
            return Err(AppError::InvalidInput(format!(
                "jwt.ttl_minutes must be between 1 and {MAX_TOKEN_TTL_MINUTES}, got {}",
                self.jwt.ttl_minutes
            )));
        }

        if self.session.idle_timeout_secs == 0 {
            return Err(AppError::InvalidInput(
                "session.idle_timeout_secs must be positive".to_string(),
            ));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "session.cookie_name must not be empty".to_string(),
            ));
        }

        let password = &self.password_requirements;
        if password.min_length == 0 || password.min_length > password.max_length {
            return Err(AppError::InvalidInput(format!(
                "password_requirements length bounds {}..={} are inconsistent",
                password.min_length, password.max_length
            )));
        }

        if self.username.min_length == 0 || self.username.min_length > self.username.max_length {
            return Err(AppError::InvalidInput(format!(
                "username length bounds {}..={} are inconsistent",
                self.username.min_length, self.username.max_length
            )));
        }

        Ok(())
    }
}
