use std::{
    env,
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use thiserror::Error;
use tracing::{debug, warn};

/// Optional file of `KEY=value` lines read by the server on startup.
pub const ENV_FILE: &str = "config.env";

const DEV_JWT_SECRET: &str = "development-only-jwt-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("Could not read environment file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

/// Load `path` into the process environment when it exists. Variables that
/// are already set keep their value.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<bool, ConfigError> {
    match dotenvy::from_path(path.as_ref()) {
        Ok(()) => {
            debug!(path = %path.as_ref().display(), "Loaded environment file");
            Ok(true)
        }
        Err(err) if err.not_found() => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// SMTP settings for outgoing mail.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub jwt_cookie_expires_in: Duration,
    pub bcrypt_cost: u32,
    pub public_dir: PathBuf,
    /// Base URL used in links sent by email
    pub app_url: String,
    pub email: EmailConfig,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Fails on unparsable values, and when `JWT_SECRET` is missing in
    /// production.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment: Environment = load("APP_ENV", "development")?;
        let port: u16 = load("PORT", "5500")?;

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if environment == Environment::Production => {
                return Err(ConfigError::Missing("JWT_SECRET"));
            }
            None => {
                warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        Ok(Self {
            environment,
            port,
            database_url: load("DATABASE_URL", "sqlite::memory:")?,
            jwt_secret,
            jwt_expires_in: days(load("JWT_EXPIRES_IN_DAYS", "90")?),
            jwt_cookie_expires_in: days(load("JWT_COOKIE_EXPIRES_IN_DAYS", "90")?),
            bcrypt_cost: load("BCRYPT_COST", "12")?,
            public_dir: load("PUBLIC_DIR", "public")?,
            app_url: load("APP_URL", &format!("http://127.0.0.1:{port}"))?,
            email: EmailConfig {
                host: load("EMAIL_HOST", "localhost")?,
                port: load("EMAIL_PORT", "25")?,
                username: load("EMAIL_USERNAME", "")?,
                password: load("EMAIL_PASSWORD", "")?,
                from: load("EMAIL_FROM", "Tourbook <hello@tourbook.example>")?,
            },
            rate_limit_max: load("RATE_LIMIT_MAX", "100")?,
            rate_limit_window: Duration::from_secs(load("RATE_LIMIT_WINDOW_SECS", "3600")?),
        })
    }

    /// Defaults suited to tests: in-memory database, cheap hashing and a
    /// fixed secret.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            environment: Environment::Development,
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expires_in: days(90),
            jwt_cookie_expires_in: days(90),
            bcrypt_cost: 4,
            public_dir: env::temp_dir().join("tourbook-public"),
            app_url: "http://127.0.0.1".to_string(),
            email: EmailConfig {
                host: "localhost".to_string(),
                port: 25,
                username: String::new(),
                password: String::new(),
                from: "Tourbook <hello@tourbook.example>".to_string(),
            },
            rate_limit_max: 10_000,
            rate_limit_window: Duration::from_secs(3600),
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

const fn days(count: u64) -> Duration {
    Duration::from_secs(count * 24 * 60 * 60)
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = var(key).unwrap_or_else(|| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    });
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value,
        reason: e.to_string(),
    })
}
