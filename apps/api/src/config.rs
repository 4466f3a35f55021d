use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Where documents live. `Memory` is for local development and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => bail!("STORAGE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub app_env: String,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_keys: usize,
    /// Honour `x-forwarded-for` for client IPs. Only set behind a reverse proxy
    /// that overwrites the header.
    pub trust_proxy: bool,
    pub auth_jwt_secret: Option<String>,
    pub dev_auth_bypass: bool,
    pub openrouter_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub frontend_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage_backend: StorageBackend = optional_env("STORAGE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;
        let database_url = match storage_backend {
            StorageBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StorageBackend::Memory => optional_env("DATABASE_URL"),
        };

        Ok(Config {
            port: parse_env("PORT", 5001)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            app_env: optional_env("APP_ENV").unwrap_or_else(|| "development".to_string()),
            storage_backend,
            database_url,
            redis_url: optional_env("REDIS_URL"),
            rate_limit_max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", 100)?,
            rate_limit_window_secs: parse_env("RATE_LIMIT_WINDOW_SECS", 60)?,
            rate_limit_max_keys: parse_env("RATE_LIMIT_MAX_KEYS", 10_000)?,
            trust_proxy: parse_env("TRUST_PROXY", false)?,
            auth_jwt_secret: optional_env("AUTH_JWT_SECRET"),
            dev_auth_bypass: parse_env("DEV_AUTH_BYPASS", false)?,
            openrouter_api_key: optional_env("OPENROUTER_API_KEY"),
            llm_model: optional_env("LLM_MODEL"),
            s3_bucket: optional_env("S3_BUCKET"),
            s3_endpoint: optional_env("S3_ENDPOINT"),
            aws_access_key_id: optional_env("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: optional_env("AWS_SECRET_ACCESS_KEY"),
            frontend_url: optional_env("FRONTEND_URL"),
        })
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }

    /// The synthetic development identity is only ever honoured outside production.
    pub fn auth_bypass_enabled(&self) -> bool {
        self.is_development() && self.dev_auth_bypass
    }
}

#[cfg(test)]
impl Default for Config {
    fn default() -> Self {
        Config {
            port: 5001,
            rust_log: "info".to_string(),
            app_env: "development".to_string(),
            storage_backend: StorageBackend::Memory,
            database_url: None,
            redis_url: None,
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 60,
            rate_limit_max_keys: 10_000,
            trust_proxy: false,
            auth_jwt_secret: None,
            dev_auth_bypass: true,
            openrouter_api_key: None,
            llm_model: None,
            s3_bucket: None,
            s3_endpoint: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            frontend_url: None,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("Postgres".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("firestore".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_bypass_requires_development() {
        let mut config = Config::default();
        assert!(config.auth_bypass_enabled());
        config.app_env = "production".to_string();
        assert!(!config.auth_bypass_enabled());
        config.app_env = "development".to_string();
        config.dev_auth_bypass = false;
        assert!(!config.auth_bypass_enabled());
    }
}
