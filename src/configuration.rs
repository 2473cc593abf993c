use std::time::Duration;

use crate::error::ConfigError;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub revocation: RevocationSettings,
    pub pool: PoolSettings,
    pub cache: CacheSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    /// sqlx SQLite URL, e.g. `sqlite:tasks.db` or `sqlite::memory:`
    pub url: String,
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub access_token_expiry: i64,  // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64, // seconds (e.g., 604800 for 7 days)
    /// bcrypt cost factor used when hashing passwords
    pub hash_cost: u32,
}

/// Sizing of the revocation filters.
///
/// The bit length is derived from how many revoked-but-unexpired tokens are
/// expected to be alive at once and the false-positive rate that is
/// tolerable at that load. `bits` overrides the derivation.
#[derive(serde::Deserialize, Clone, Debug)]
pub struct RevocationSettings {
    pub expected_tokens: usize,
    pub false_positive_rate: f64,
    pub hash_functions: u32,
    #[serde(default)]
    pub bits: Option<u64>,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustionPolicy {
    /// Hand out an already leased handle instead of blocking.
    Share,
    /// Wait for a release, up to `acquire_timeout_ms`.
    Wait,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct PoolSettings {
    pub size: usize,
    pub idle_timeout_ms: u64,
    pub on_exhausted: ExhaustionPolicy,
    pub acquire_timeout_ms: u64,
}

impl PoolSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct CacheSettings {
    pub ttl_ms: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Settings {
    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        if self.jwt.access_token_expiry <= 0 || self.jwt.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt token expiry must be positive".to_string(),
            ));
        }
        if !(4..=31).contains(&self.jwt.hash_cost) {
            return Err(ConfigError::InvalidValue(
                "jwt.hash_cost must be between 4 and 31".to_string(),
            ));
        }
        if !(1..=crate::auth::MAX_HASH_FUNCTIONS as u32).contains(&self.revocation.hash_functions)
        {
            return Err(ConfigError::InvalidValue(format!(
                "revocation.hash_functions must be between 1 and {}",
                crate::auth::MAX_HASH_FUNCTIONS
            )));
        }
        let p = self.revocation.false_positive_rate;
        if !(p > 0.0 && p < 1.0) {
            return Err(ConfigError::InvalidValue(
                "revocation.false_positive_rate must be in (0, 1)".to_string(),
            ));
        }
        if self.revocation.expected_tokens == 0 {
            return Err(ConfigError::InvalidValue(
                "revocation.expected_tokens must be positive".to_string(),
            ));
        }
        if matches!(self.revocation.bits, Some(0)) {
            return Err(ConfigError::InvalidValue(
                "revocation.bits must be positive".to_string(),
            ));
        }
        if self.pool.size == 0 {
            return Err(ConfigError::InvalidValue("pool.size must be positive".to_string()));
        }
        if self.cache.ttl_ms == 0 {
            return Err(ConfigError::InvalidValue("cache.ttl_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Load settings from built-in defaults, an optional `configuration` file
/// and `APP_`-prefixed environment variables, in that order of precedence.
///
/// `APP_JWT__SECRET=...` overrides `jwt.secret`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8000)?
        .set_default("database.url", "sqlite:tasks.db")?
        .set_default("jwt.secret", "dev-secret")?
        .set_default("jwt.issuer", "taskboard")?
        .set_default("jwt.access_token_expiry", 60 * 15)?
        .set_default("jwt.refresh_token_expiry", 60 * 60 * 24 * 7)?
        .set_default("jwt.hash_cost", 12)?
        .set_default("revocation.expected_tokens", 10_000)?
        .set_default("revocation.false_positive_rate", 0.01)?
        .set_default("revocation.hash_functions", 2)?
        .set_default("pool.size", 5)?
        .set_default("pool.idle_timeout_ms", 30_000)?
        .set_default("pool.on_exhausted", "share")?
        .set_default("pool.acquire_timeout_ms", 5_000)?
        .set_default("cache.ttl_ms", 30_000)?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
