//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Result, TurnstileError};
use crate::filter::ResponseSettings;
use crate::ratelimit::{
    Admission, BucketStore, Clock, LruStore, StoreSettings, SweepSettings, SystemClock, TtlStore,
    Whitelist, DEFAULT_CAPACITY, DEFAULT_MIN_IDLE, DEFAULT_SWEEP_INTERVAL, DEFAULT_WINDOW,
};

/// Status code sent when a request is rejected.
pub const DEFAULT_REJECTED_CODE: u16 = 429;
/// Body sent when a request is rejected.
pub const DEFAULT_REJECTED_MSG: &str = "Too many requests";

/// Prefix for environment overrides, e.g. `TURNSTILE_QPS=50`.
const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for a Turnstile instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Admissions per key per second; required and non-zero
    #[serde(default)]
    pub qps: Option<u64>,

    /// Literal hosts and `regexp:` patterns exempt from limiting
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Emit `X-RateLimit-*` quota headers
    #[serde(default)]
    pub show_limit_quota_header: bool,

    /// Status code for rejected requests
    #[serde(default = "default_rejected_code")]
    pub rejected_code: u16,

    /// Body for rejected requests
    #[serde(default = "default_rejected_msg")]
    pub rejected_msg: String,

    /// Memory bound for tracked keys
    #[serde(default)]
    pub eviction: EvictionConfig,
}

impl Default for TurnstileConfig {
    fn default() -> Self {
        Self {
            qps: None,
            whitelist: Vec::new(),
            show_limit_quota_header: false,
            rejected_code: default_rejected_code(),
            rejected_msg: default_rejected_msg(),
            eviction: EvictionConfig::default(),
        }
    }
}

fn default_rejected_code() -> u16 {
    DEFAULT_REJECTED_CODE
}

fn default_rejected_msg() -> String {
    DEFAULT_REJECTED_MSG.to_string()
}

/// How the set of tracked keys is bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum EvictionConfig {
    /// Keep at most `capacity` keys, evicting the least recently used.
    Lru {
        #[serde(default = "default_capacity")]
        capacity: usize,
    },
    /// Periodically drop keys idle for longer than `min_idle_ms`.
    Ttl {
        #[serde(default = "default_sweep_interval_ms")]
        sweep_interval_ms: u64,
        #[serde(default = "default_min_idle_ms")]
        min_idle_ms: u64,
    },
}

impl Default for EvictionConfig {
    fn default() -> Self {
        EvictionConfig::Lru {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_sweep_interval_ms() -> u64 {
    u64::try_from(DEFAULT_SWEEP_INTERVAL.as_millis()).unwrap_or(u64::MAX)
}

fn default_min_idle_ms() -> u64 {
    u64::try_from(DEFAULT_MIN_IDLE.as_millis()).unwrap_or(u64::MAX)
}

impl EvictionConfig {
    fn validate(&self) -> Result<()> {
        match self {
            EvictionConfig::Lru { capacity: 0 } => Err(TurnstileError::Config(
                "eviction capacity must be greater than 0".to_string(),
            )),
            EvictionConfig::Ttl {
                sweep_interval_ms: 0,
                ..
            } => Err(TurnstileError::Config(
                "eviction sweep_interval_ms must be greater than 0".to_string(),
            )),
            // A bucket idle for less than one window may still hold spent tokens.
            EvictionConfig::Ttl { min_idle_ms, .. }
                if Duration::from_millis(*min_idle_ms) < DEFAULT_WINDOW =>
            {
                Err(TurnstileError::Config(format!(
                    "eviction min_idle_ms must be at least {}",
                    DEFAULT_WINDOW.as_millis()
                )))
            }
            _ => Ok(()),
        }
    }

    fn build_store(&self, settings: StoreSettings, clock: Arc<dyn Clock>) -> Result<Arc<dyn BucketStore>> {
        let store: Arc<dyn BucketStore> = match *self {
            EvictionConfig::Lru { capacity } => {
                let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
                    TurnstileError::Config("eviction capacity must be greater than 0".to_string())
                })?;
                Arc::new(LruStore::with_clock(settings, capacity, clock))
            }
            EvictionConfig::Ttl {
                sweep_interval_ms,
                min_idle_ms,
            } => {
                let sweep = SweepSettings {
                    interval: Duration::from_millis(sweep_interval_ms),
                    min_idle: Duration::from_millis(min_idle_ms),
                };
                Arc::new(TtlStore::with_clock(settings, sweep, clock))
            }
        };
        Ok(store)
    }
}

impl TurnstileConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse YAML config: {}", e)))
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse JSON config: {}", e)))
    }

    /// Load configuration from a file, layering `TURNSTILE_*` environment
    /// overrides on top. The format follows the file extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        // Surface a missing or unreadable file as an I/O error.
        std::fs::metadata(path)?;

        let config = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// The validated per-second quota.
    pub fn tokens_per_second(&self) -> Result<u64> {
        match self.qps {
            Some(qps) if qps > 0 => Ok(qps),
            _ => Err(TurnstileError::Config("qps must be greater than 0".to_string())),
        }
    }

    /// Check every field without building anything.
    pub fn validate(&self) -> Result<()> {
        self.tokens_per_second()?;

        if !(100..=599).contains(&self.rejected_code) {
            return Err(TurnstileError::Config(format!(
                "rejected_code {} is not a valid HTTP status code",
                self.rejected_code
            )));
        }

        self.eviction.validate()
    }

    /// Response-side settings for the request filter.
    pub fn response_settings(&self) -> ResponseSettings {
        ResponseSettings {
            show_limit_quota_header: self.show_limit_quota_header,
            rejected_code: self.rejected_code,
            rejected_msg: self.rejected_msg.clone(),
        }
    }

    /// Build the admission pipeline on the system clock.
    pub fn build(&self) -> Result<Admission> {
        self.build_with_clock(Arc::new(SystemClock))
    }

    /// Build the admission pipeline driven by `clock`.
    pub fn build_with_clock(&self, clock: Arc<dyn Clock>) -> Result<Admission> {
        self.validate()?;
        let qps = self.tokens_per_second()?;

        if self.whitelist.is_empty() {
            warn!("No whitelist rules configured, every request is subject to rate limiting");
        }
        let whitelist = Whitelist::compile(&self.whitelist)?;

        let store = self.eviction.build_store(StoreSettings::per_second(qps), clock)?;

        info!(
            qps,
            literal_rules = whitelist.literal_count(),
            pattern_rules = whitelist.pattern_count(),
            eviction = ?self.eviction,
            "Rate limiter configured"
        );

        Ok(Admission::new(whitelist, store))
    }
}
