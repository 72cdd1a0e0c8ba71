use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    // Logging
    pub log_dir: String,
    pub log_level: tracing::Level,

    /// First check-in at or before this time counts as on time
    pub on_time_cutoff: NaiveTime,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.parse()
        .map_err(|e| anyhow!("{key} has invalid value {raw:?}: {e}"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cutoff_raw = lookup("ON_TIME_CUTOFF").unwrap_or_else(|| "09:00:00".to_string());
        let on_time_cutoff = NaiveTime::parse_from_str(&cutoff_raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&cutoff_raw, "%H:%M"))
            .with_context(|| format!("ON_TIME_CUTOFF has invalid value {cutoff_raw:?}"))?;

        Ok(Self {
            database_url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: lookup("JWT_SECRET").context("JWT_SECRET must be set")?,
            server_addr: lookup("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:8085".to_string()),
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", "10")?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", "1000")?,
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: parse_or(&lookup, "LOG_LEVEL", "debug")?,
            on_time_cutoff,
        })
    }
}
