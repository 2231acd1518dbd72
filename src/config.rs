use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::finality::DEFAULT_REQUIRED_CONFIRMATIONS;
use crate::services::scanner::DEFAULT_SCAN_WINDOW;
use crate::services::MonitorConfig;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub health_port: u16,
    pub database_url: String,
    pub evm_rpc_url: Option<String>,
    pub xrpl_rpc_url: Option<String>,
    pub solana_rpc_url: Option<String>,
    pub evm_native_token: String,
    pub log_format: LogFormat,
    pub reconciler: ReconcilerConfig,
}

/// Scheduling and finality tuning for the background jobs.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
    pub max_age_hours: i64,
    pub confirmations: u64,
    pub scanner_interval_secs: u64,
    pub scanner_window_blocks: u64,
    pub rpc_timeout_secs: u64,
    pub rpc_failure_threshold: u32,
    pub rpc_reset_timeout_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            initial_delay_secs: 15,
            max_age_hours: 24,
            confirmations: DEFAULT_REQUIRED_CONFIRMATIONS,
            scanner_interval_secs: 30,
            scanner_window_blocks: DEFAULT_SCAN_WINDOW,
            rpc_timeout_secs: 15,
            rpc_failure_threshold: 3,
            rpc_reset_timeout_secs: 60,
        }
    }
}

impl ReconcilerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn scanner_interval(&self) -> Duration {
        Duration::from_secs(self.scanner_interval_secs)
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        let max_age = chrono::Duration::try_hours(self.max_age_hours).with_context(|| {
            format!(
                "RECONCILER_MAX_AGE_HOURS is out of range: {}",
                self.max_age_hours
            )
        })?;

        Ok(MonitorConfig {
            max_age,
            check_timeout: Duration::from_secs(self.rpc_timeout_secs),
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset keys take their defaults;
    /// set but unparsable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ReconcilerConfig::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let reconciler = ReconcilerConfig {
            interval_secs: parse_or(&lookup, "RECONCILER_INTERVAL_SECS", defaults.interval_secs)?,
            initial_delay_secs: parse_or(
                &lookup,
                "RECONCILER_INITIAL_DELAY_SECS",
                defaults.initial_delay_secs,
            )?,
            max_age_hours: parse_or(&lookup, "RECONCILER_MAX_AGE_HOURS", defaults.max_age_hours)?,
            confirmations: parse_or(&lookup, "RECONCILER_CONFIRMATIONS", defaults.confirmations)?,
            scanner_interval_secs: parse_or(
                &lookup,
                "SCANNER_INTERVAL_SECS",
                defaults.scanner_interval_secs,
            )?,
            scanner_window_blocks: parse_or(
                &lookup,
                "SCANNER_WINDOW_BLOCKS",
                defaults.scanner_window_blocks,
            )?,
            rpc_timeout_secs: parse_or(
                &lookup,
                "RECONCILER_RPC_TIMEOUT_SECS",
                defaults.rpc_timeout_secs,
            )?,
            rpc_failure_threshold: parse_or(
                &lookup,
                "RPC_FAILURE_THRESHOLD",
                defaults.rpc_failure_threshold,
            )?,
            rpc_reset_timeout_secs: parse_or(
                &lookup,
                "RPC_RESET_TIMEOUT_SECS",
                defaults.rpc_reset_timeout_secs,
            )?,
        };

        if reconciler.interval_secs == 0 || reconciler.scanner_interval_secs == 0 {
            anyhow::bail!("RECONCILER_INTERVAL_SECS and SCANNER_INTERVAL_SECS must be positive");
        }
        if reconciler.max_age_hours <= 0 {
            anyhow::bail!("RECONCILER_MAX_AGE_HOURS must be positive");
        }
        reconciler.monitor_config()?;

        let log_format = match non_empty("LOG_FORMAT").as_deref() {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Config {
            health_port: parse_or(&lookup, "HEALTH_PORT", 3000)?,
            database_url: non_empty("DATABASE_URL").context("DATABASE_URL must be set")?,
            evm_rpc_url: non_empty("EVM_RPC_URL"),
            xrpl_rpc_url: non_empty("XRPL_RPC_URL"),
            solana_rpc_url: non_empty("SOLANA_RPC_URL"),
            evm_native_token: non_empty("EVM_NATIVE_TOKEN").unwrap_or_else(|| "ETH".to_string()),
            log_format,
            reconciler,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: '{}'", key, raw)),
        _ => Ok(default),
    }
}
