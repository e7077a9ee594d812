//! Configuration management for the server.

use chrono::FixedOffset;
use hostsync_engine::RollupPolicy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Destination table ids for the built-in pipelines.
#[derive(Debug, Clone, Default)]
pub struct TableIds {
    pub charges: Option<String>,
    pub reservations: Option<String>,
    pub availability: Option<String>,
    pub daily_revenue: Option<String>,
    pub monthly_revenue: Option<String>,
    pub quarterly_revenue: Option<String>,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Hostaway API base URL
    pub hostaway_base_url: String,
    /// Hostaway bearer token; without it no source calls are made
    pub hostaway_token: Option<String>,
    /// Teable API base URL
    pub teable_base_url: String,
    /// Teable bearer token; without it no destination calls are made
    pub teable_token: Option<String>,
    pub tables: TableIds,
    /// Seconds between scheduled runs, `0` disables the scheduler
    pub sync_interval_secs: u64,
    /// Timeout for ordinary outbound calls
    pub request_timeout_secs: u64,
    /// Offset of the business timezone, defines "today"
    pub business_offset: FixedOffset,
    /// Aggregation policy for revenue rollups
    pub rollup_policy: RollupPolicy,
    /// Optional JSON file with extra pipeline definitions
    pub pipelines_file: Option<PathBuf>,
    /// Bearer secret protecting the on-demand trigger
    pub auth_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let sync_interval_secs = parse_or(var("SYNC_INTERVAL_SECS"), 3600, "SYNC_INTERVAL_SECS")?;
        let request_timeout_secs =
            parse_or(var("REQUEST_TIMEOUT_SECS"), 30, "REQUEST_TIMEOUT_SECS")?;

        let offset_minutes: i32 = parse_or(
            var("BUSINESS_UTC_OFFSET_MINUTES"),
            240,
            "BUSINESS_UTC_OFFSET_MINUTES",
        )?;
        let business_offset =
            FixedOffset::east_opt(offset_minutes * 60).ok_or(ConfigError::InvalidOffset)?;

        let rollup_policy = match var("MONTHLY_ROLLUP_POLICY") {
            Some(value) => RollupPolicy::from_str(&value)
                .map_err(|_| ConfigError::InvalidPolicy(value))?,
            None => RollupPolicy::default(),
        };

        Ok(Self {
            host,
            port,
            hostaway_base_url: trim_base(
                var("HOSTAWAY_BASE_URL").unwrap_or_else(|| "https://api.hostaway.com".into()),
            ),
            hostaway_token: var("HOSTAWAY_TOKEN"),
            teable_base_url: trim_base(
                var("TEABLE_BASE_URL").unwrap_or_else(|| "https://app.teable.io".into()),
            ),
            teable_token: var("TEABLE_TOKEN"),
            tables: TableIds {
                charges: var("TEABLE_CHARGES_TABLE_ID"),
                reservations: var("TEABLE_RESERVATIONS_TABLE_ID"),
                availability: var("TEABLE_AVAILABILITY_TABLE_ID"),
                daily_revenue: var("TEABLE_DAILY_REVENUE_TABLE_ID"),
                monthly_revenue: var("TEABLE_MONTHLY_REVENUE_TABLE_ID"),
                quarterly_revenue: var("TEABLE_QUARTERLY_REVENUE_TABLE_ID"),
            },
            sync_interval_secs,
            request_timeout_secs,
            business_offset,
            rollup_policy,
            pipelines_file: var("PIPELINES_FILE").map(PathBuf::from),
            auth_secret: var("AUTH_SECRET"),
        })
    }
}

fn parse_or<T: FromStr>(
    value: Option<String>,
    default: T,
    name: &'static str,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidNumber(name)),
        None => Ok(default),
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),

    #[error("BUSINESS_UTC_OFFSET_MINUTES is out of range")]
    InvalidOffset,

    #[error("Unknown MONTHLY_ROLLUP_POLICY: {0}")]
    InvalidPolicy(String),

    #[error("Cannot read pipelines file {path}: {reason}")]
    PipelinesFile { path: String, reason: String },

    #[error("Invalid pipeline definition: {0}")]
    InvalidPipeline(#[from] hostsync_engine::Error),
}
