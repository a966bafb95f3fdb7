use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    /// Percentage (0-100) a chapter quiz or coding submission must reach to pass.
    pub mcq_pass_threshold: f64,
    pub judge_api_url: Url,
    pub judge_api_key: Option<String>,
    pub judge_poll_attempts: u32,
    pub judge_poll_interval_ms: u64,
    pub certificate_secret: String,
    pub mail_webhook_url: Option<Url>,
    pub mail_api_key: Option<String>,
    pub outbox_poll_interval_ms: u64,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let mcq_pass_threshold: f64 = get_env_or("MCQ_PASS_THRESHOLD", 70.0)?;
        if !(0.0..=100.0).contains(&mcq_pass_threshold) {
            return Err(Error::Config(format!(
                "MCQ_PASS_THRESHOLD must be between 0 and 100, got {}",
                mcq_pass_threshold
            )));
        }

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_or("DATABASE_MAX_CONNECTIONS", 20)?,
            jwt_secret: get_env("JWT_SECRET")?,
            jwt_ttl_hours: get_env_or("JWT_TTL_HOURS", 24)?,
            mcq_pass_threshold,
            judge_api_url: get_env_parse("JUDGE_API_URL")?,
            judge_api_key: env::var("JUDGE_API_KEY").ok().filter(|v| !v.is_empty()),
            judge_poll_attempts: get_env_or("JUDGE_POLL_ATTEMPTS", 10)?,
            judge_poll_interval_ms: get_env_or("JUDGE_POLL_INTERVAL_MS", 1000)?,
            certificate_secret: get_env("CERTIFICATE_SECRET")?,
            mail_webhook_url: get_env_opt("MAIL_WEBHOOK_URL")?,
            mail_api_key: env::var("MAIL_API_KEY").ok().filter(|v| !v.is_empty()),
            outbox_poll_interval_ms: get_env_or("OUTBOX_POLL_INTERVAL_MS", 1000)?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

fn get_env_opt<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => get_env_parse(name).map(Some),
        _ => Ok(None),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
