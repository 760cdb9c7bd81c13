//! Agent configuration parameters
//!
//! Everything the node needs to reach its collector: Wi-Fi credentials,
//! broker endpoint and credentials, publish topic, sampling cadence and
//! the link retry policy.  Values are fixed at build time through
//! `PLANTNODE_*` environment variables (see `build.rs`) and are immutable
//! at runtime.

use core::time::Duration;

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Default telemetry topic: identifies the node and the stream.
pub const DEFAULT_TOPIC: &str = "plants/travel-node/telemetry";

/// Maximum broker URL length.
pub const MAX_URL_LEN: usize = 128;
/// Maximum topic length.
pub const MAX_TOPIC_LEN: usize = 96;

const _: () = assert!(DEFAULT_TOPIC.len() <= MAX_TOPIC_LEN);

/// How the sampling loop spaces its cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cadence {
    /// Sleep a full period after each cycle body; execution time delays
    /// the next cycle by that amount.
    #[default]
    AfterWork,
    /// Sleep until `start + N * period`; an overrun re-anchors the schedule.
    FixedRate,
}

/// Wi-Fi station credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub ssid: String<32>,
    pub password: String<64>,
}

/// Remote collector endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// `mqtts://host:port` or `wss://host/path`.
    pub broker_url: String<MAX_URL_LEN>,
    pub username: String<64>,
    pub password: String<64>,
    /// Fixed topic every telemetry message is published to.
    pub topic: String<MAX_TOPIC_LEN>,
    /// Interval the transport waits between its own reconnect attempts.
    pub reconnect_interval_ms: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let mut topic = String::new();
        // Cannot overflow: DEFAULT_TOPIC is checked against MAX_TOPIC_LEN
        // at compile time.
        let _ = topic.push_str(DEFAULT_TOPIC);
        Self {
            broker_url: String::new(),
            username: String::new(),
            password: String::new(),
            topic,
            reconnect_interval_ms: 10_000,
        }
    }
}

/// Sampling loop timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Cycle period (milliseconds).
    pub interval_ms: u32,
    pub cadence: Cadence,
    /// Emit a statistics summary every N cycles (0 = never).
    pub stats_every_cycles: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000, // 10 s
            cadence: Cadence::AfterWork,
            stats_every_cycles: 60, // every ~10 min
        }
    }
}

/// Complete agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub network: NetworkConfig,
    pub collector: CollectorConfig,
    pub sampling: SamplingConfig,
    /// Wi-Fi reconnect backoff.
    pub link_retry: RetryPolicy,
    /// Startup deadline for link readiness (seconds, 0 = wait forever).
    pub ready_timeout_secs: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            collector: CollectorConfig::default(),
            sampling: SamplingConfig::default(),
            link_retry: RetryPolicy::default(),
            ready_timeout_secs: 120,
        }
    }
}

impl AgentConfig {
    /// Load the configuration baked in at build time.
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Self::from_lookup(build_env)
    }

    /// Build a configuration from a key lookup, falling back to defaults
    /// for absent keys.
    pub fn from_lookup<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(v) = lookup("PLANTNODE_WIFI_SSID") {
            cfg.network.ssid = bounded("ssid", v)?;
        }
        if let Some(v) = lookup("PLANTNODE_WIFI_PASS") {
            cfg.network.password = bounded("wifi_password", v)?;
        }
        if let Some(v) = lookup("PLANTNODE_BROKER_URL") {
            cfg.collector.broker_url = bounded("broker_url", v)?;
        }
        if let Some(v) = lookup("PLANTNODE_BROKER_USER") {
            cfg.collector.username = bounded("broker_user", v)?;
        }
        if let Some(v) = lookup("PLANTNODE_BROKER_PASS") {
            cfg.collector.password = bounded("broker_password", v)?;
        }
        if let Some(v) = lookup("PLANTNODE_TOPIC") {
            cfg.collector.topic = bounded("topic", v)?;
        }
        if let Some(v) = lookup("PLANTNODE_SAMPLE_INTERVAL_MS") {
            cfg.sampling.interval_ms = parse_u32("sample_interval_ms", v)?;
        }
        if let Some(v) = lookup("PLANTNODE_READY_TIMEOUT_SECS") {
            cfg.ready_timeout_secs = parse_u32("ready_timeout_secs", v)?;
        }

        Ok(cfg)
    }

    /// Reject configurations the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ssid(&self.network.ssid)?;
        validate_password(&self.network.password)?;
        validate_broker_url(&self.collector.broker_url)?;
        validate_topic(&self.collector.topic)?;
        if !(100..=86_400_000).contains(&self.sampling.interval_ms) {
            return Err(ConfigError::OutOfRange("sample_interval_ms"));
        }
        if self.collector.reconnect_interval_ms == 0 {
            return Err(ConfigError::OutOfRange("reconnect_interval_ms"));
        }
        self.link_retry.validate()
    }

    /// Startup readiness deadline; `None` waits indefinitely.
    pub fn ready_timeout(&self) -> Option<Duration> {
        match self.ready_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.sampling.interval_ms))
    }
}

fn build_env(key: &str) -> Option<&'static str> {
    match key {
        "PLANTNODE_WIFI_SSID" => option_env!("PLANTNODE_WIFI_SSID"),
        "PLANTNODE_WIFI_PASS" => option_env!("PLANTNODE_WIFI_PASS"),
        "PLANTNODE_BROKER_URL" => option_env!("PLANTNODE_BROKER_URL"),
        "PLANTNODE_BROKER_USER" => option_env!("PLANTNODE_BROKER_USER"),
        "PLANTNODE_BROKER_PASS" => option_env!("PLANTNODE_BROKER_PASS"),
        "PLANTNODE_TOPIC" => option_env!("PLANTNODE_TOPIC"),
        "PLANTNODE_SAMPLE_INTERVAL_MS" => option_env!("PLANTNODE_SAMPLE_INTERVAL_MS"),
        "PLANTNODE_READY_TIMEOUT_SECS" => option_env!("PLANTNODE_READY_TIMEOUT_SECS"),
        _ => None,
    }
}

fn bounded<const N: usize>(field: &'static str, value: &str) -> Result<String<N>, ConfigError> {
    let mut s = String::new();
    s.push_str(value).map_err(|_| ConfigError::TooLong(field))?;
    Ok(s)
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::OutOfRange(field))
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), ConfigError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConfigError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ConfigError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConfigError::InvalidPassword);
    }
    Ok(())
}

fn validate_broker_url(url: &str) -> Result<(), ConfigError> {
    let host = url
        .strip_prefix("mqtts://")
        .or_else(|| url.strip_prefix("wss://"))
        .ok_or(ConfigError::InvalidBrokerUrl)?;
    if host.is_empty() || !is_printable_ascii(host) {
        return Err(ConfigError::InvalidBrokerUrl);
    }
    Ok(())
}

fn validate_topic(topic: &str) -> Result<(), ConfigError> {
    if topic.is_empty() || topic.contains(['+', '#']) || !is_printable_ascii(topic) {
        return Err(ConfigError::InvalidTopic);
    }
    Ok(())
}
