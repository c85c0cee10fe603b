use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::common::utils::DEFAULT_NOMINATIM_URL;
use crate::domains::dispatch::DispatchPolicy;
use crate::domains::presence::effects::DEFAULT_STALE_AFTER_SECS;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub expo_access_token: Option<String>,
    pub webhook_url: Option<String>,
    pub nominatim_url: String,
    pub presence_sweep_cron: String,
    pub presence_stale_after_secs: i64,
    pub dispatch_max_attempts: u32,
    pub dispatch_max_elapsed_secs: i64,
    pub dispatch_retry_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or("PORT", 8080)?,
            expo_access_token: env::var("EXPO_ACCESS_TOKEN").ok(),
            webhook_url: env::var("WEBHOOK_URL").ok().filter(|url| !url.is_empty()),
            nominatim_url: env::var("NOMINATIM_URL")
                .unwrap_or_else(|_| DEFAULT_NOMINATIM_URL.to_string()),
            presence_sweep_cron: env::var("PRESENCE_SWEEP_CRON")
                .unwrap_or_else(|_| "0 * * * * *".to_string()),
            presence_stale_after_secs: parse_or(
                "PRESENCE_STALE_AFTER_SECS",
                DEFAULT_STALE_AFTER_SECS,
            )?,
            dispatch_max_attempts: parse_or("DISPATCH_MAX_ATTEMPTS", 10)?,
            dispatch_max_elapsed_secs: parse_or("DISPATCH_MAX_ELAPSED_SECS", 900)?,
            dispatch_retry_limit: parse_or("DISPATCH_RETRY_LIMIT", 3)?,
        })
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            max_attempts: self.dispatch_max_attempts,
            max_elapsed: chrono::Duration::seconds(self.dispatch_max_elapsed_secs),
            retry_limit: self.dispatch_retry_limit,
            ..DispatchPolicy::default()
        }
    }

    pub fn presence_stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.presence_stale_after_secs)
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .ok()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}
