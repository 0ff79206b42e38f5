//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use tracing::debug;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
        }
    }
}

/// Database configuration
///
/// Without a `url` the service runs on the in-memory store.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Apply embedded migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            run_migrations: true,
        }
    }
}

/// Generation and ledger configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Probability that the simulator reports a failure
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,

    /// Upper bound on one simulator call, in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Attempts per atomic unit before a write conflict becomes fatal
    #[serde(default = "default_retry_attempts")]
    pub atomic_retry_attempts: u32,

    /// Linear backoff step between conflicting attempts, in milliseconds
    #[serde(default = "default_retry_backoff")]
    pub atomic_retry_backoff_ms: u64,
}

fn default_failure_rate() -> f64 {
    0.05
}

fn default_generation_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_backoff() -> u64 {
    25
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            failure_rate: default_failure_rate(),
            timeout_secs: default_generation_timeout(),
            atomic_retry_attempts: default_retry_attempts(),
            atomic_retry_backoff_ms: default_retry_backoff(),
        }
    }
}

/// Weekly report configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    /// Run the Monday 09:00 UTC scheduler inside the server process
    #[serde(default = "default_true")]
    pub schedule_enabled: bool,

    #[serde(default)]
    pub thresholds: AnomalyThresholds,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            schedule_enabled: true,
            thresholds: AnomalyThresholds::default(),
        }
    }
}

/// Success-rate drop: current below `previous * ratio`
pub const SUCCESS_RATE_DROP_RATIO: f64 = 0.5;
/// Volume and spend spikes: current above `previous * multiplier`
pub const USAGE_SPIKE_MULTIPLIER: f64 = 3.0;
/// Previous-period sample size a comparison needs
pub const MIN_SAMPLES_FOR_ANOMALY: u64 = 10;
/// Category failure rate (percent) a spike must also exceed
pub const SIGNIFICANT_FAILURE_RATE: f64 = 20.0;
/// Category failure spike: current above `previous * multiplier`
pub const FAILURE_RATE_SPIKE_MULTIPLIER: f64 = 2.0;

/// Anomaly detection thresholds
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct AnomalyThresholds {
    #[serde(default = "default_success_rate_drop_ratio")]
    pub success_rate_drop_ratio: f64,

    #[serde(default = "default_usage_spike_multiplier")]
    pub usage_spike_multiplier: f64,

    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    #[serde(default = "default_significant_failure_rate")]
    pub significant_failure_rate: f64,

    #[serde(default = "default_failure_rate_spike_multiplier")]
    pub failure_rate_spike_multiplier: f64,
}

fn default_success_rate_drop_ratio() -> f64 {
    SUCCESS_RATE_DROP_RATIO
}

fn default_usage_spike_multiplier() -> f64 {
    USAGE_SPIKE_MULTIPLIER
}

fn default_min_samples() -> u64 {
    MIN_SAMPLES_FOR_ANOMALY
}

fn default_significant_failure_rate() -> f64 {
    SIGNIFICANT_FAILURE_RATE
}

fn default_failure_rate_spike_multiplier() -> f64 {
    FAILURE_RATE_SPIKE_MULTIPLIER
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            success_rate_drop_ratio: SUCCESS_RATE_DROP_RATIO,
            usage_spike_multiplier: USAGE_SPIKE_MULTIPLIER,
            min_samples: MIN_SAMPLES_FOR_ANOMALY,
            significant_failure_rate: SIGNIFICANT_FAILURE_RATE,
            failure_rate_spike_multiplier: FAILURE_RATE_SPIKE_MULTIPLIER,
        }
    }
}

/// In-memory backend configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MemoryConfig {
    /// Users provisioned at startup, id to opening balance
    #[serde(default)]
    pub seed_users: BTreeMap<String, i64>,
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        debug!(run_mode = %run_mode, "Loading configuration");

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.run_migrations", true)?
            .set_default("generation.failure_rate", 0.05)?
            .set_default("generation.timeout_secs", 30)?
            .set_default("generation.atomic_retry_attempts", 5)?
            .set_default("generation.atomic_retry_backoff_ms", 25)?
            .set_default("reports.schedule_enabled", true)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with CANVAS_ prefix
            .add_source(
                Environment::with_prefix("CANVAS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("CANVAS").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Whether the PostgreSQL backend is configured
    pub fn uses_database(&self) -> bool {
        self.database
            .url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false)
    }
}
