//! Server configuration from `.env` and environment variables.
//!
//! Unset or empty variables fall back to defaults; set-but-unparsable ones are errors.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail};
use spindle_core::EngineConfig;
use spindle_core::app::{Backpressure, RetentionConfig};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Read `.env`, then the process environment.
    pub fn load() -> anyhow::Result<Self> {
        load_dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = EngineConfig::default();

        let backpressure = match get("SPINDLE_BACKPRESSURE").as_deref() {
            None | Some("reject") => Backpressure::Reject,
            Some("block") => {
                let ms = parse_or(&get, "SPINDLE_ENQUEUE_TIMEOUT_MS", 1_000u64)?;
                Backpressure::BlockWithTimeout(Duration::from_millis(ms))
            }
            Some(other) => {
                bail!("SPINDLE_BACKPRESSURE must be 'reject' or 'block', got '{other}'")
            }
        };

        let retention = match parse_opt::<u64>(&get, "SPINDLE_RETENTION_SECS")? {
            Some(secs) => {
                let interval = parse_or(&get, "SPINDLE_REAP_INTERVAL_SECS", 60u64)?;
                Some(RetentionConfig {
                    max_age: Duration::from_secs(secs),
                    interval: Duration::from_secs(interval),
                })
            }
            None => None,
        };

        let engine = EngineConfig {
            concurrency: parse_or(&get, "SPINDLE_CONCURRENCY", defaults.concurrency)?,
            queue_capacity: parse_or(&get, "SPINDLE_QUEUE_CAPACITY", defaults.queue_capacity)?,
            backpressure,
            max_outstanding: parse_opt(&get, "SPINDLE_MAX_OUTSTANDING")?,
            default_task_timeout: parse_opt(&get, "SPINDLE_TASK_TIMEOUT_MS")?
                .map(Duration::from_millis),
            shutdown_timeout: parse_opt(&get, "SPINDLE_SHUTDOWN_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_timeout),
            retention,
        };
        engine.validate().map_err(|e| anyhow!(e))?;

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 8000u16)?,
            engine,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_opt<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("invalid value for {key}: '{raw}' ({e})")),
        None => Ok(None),
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(parse_opt(get, key)?.unwrap_or(default))
}
