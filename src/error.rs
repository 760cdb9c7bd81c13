//! Unified error types for the PlantNode firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! startup sequence can funnel failures through one path.  All variants
//! are `Copy` and carry ESP-IDF style numeric codes where the platform
//! provides one, so diagnostics can print the exact driver result.

use core::fmt;

// ---------------------------------------------------------------------------
// ESP-IDF result codes (mirrored so host builds can name them)
// ---------------------------------------------------------------------------

/// `ESP_OK`.
pub const ESP_OK: i32 = 0;
/// `ESP_FAIL`.
pub const ESP_FAIL: i32 = -1;
/// `ESP_ERR_INVALID_ARG`.
pub const ESP_ERR_INVALID_ARG: i32 = 0x102;
/// `ESP_ERR_INVALID_STATE`.
pub const ESP_ERR_INVALID_STATE: i32 = 0x103;
/// `ESP_ERR_TIMEOUT`.
pub const ESP_ERR_TIMEOUT: i32 = 0x107;
/// `ESP_ERR_INVALID_RESPONSE`.
pub const ESP_ERR_INVALID_RESPONSE: i32 = 0x108;
/// `ESP_ERR_INVALID_CRC`.
pub const ESP_ERR_INVALID_CRC: i32 = 0x109;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned implausible data.
    Sensor(SensorError),
    /// The network link or the collector session failed.
    Comms(CommsError),
    /// Peripheral or collaborator initialisation failed.
    Init(&'static str),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor did not answer within the protocol timing window.
    Timeout,
    /// Frame checksum mismatch.
    Checksum,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// The platform driver returned an error code.
    Driver(i32),
}

impl SensorError {
    /// ESP-IDF style result code for diagnostic logging.
    pub const fn code(self) -> i32 {
        match self {
            Self::Timeout => ESP_ERR_TIMEOUT,
            Self::Checksum => ESP_ERR_INVALID_CRC,
            Self::OutOfRange => ESP_ERR_INVALID_RESPONSE,
            Self::Driver(code) => code,
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "sensor timeout"),
            Self::Checksum => write!(f, "frame checksum mismatch"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::Driver(code) => write!(f, "driver error (rc={code})"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// The Wi-Fi driver could not be started.
    WifiStartFailed,
    /// Link readiness was not observed before the startup deadline.
    ReadyTimeout,
    /// More concurrent readiness waiters than the signal supports.
    TooManyWaiters,
    /// The MQTT session could not be opened.
    SessionStartFailed,
    /// The trust anchor is missing or malformed.
    InvalidTrustAnchor,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiStartFailed => write!(f, "WiFi start failed"),
            Self::ReadyTimeout => write!(f, "timed out waiting for network readiness"),
            Self::TooManyWaiters => write!(f, "too many readiness waiters"),
            Self::SessionStartFailed => write!(f, "MQTT session start failed"),
            Self::InvalidTrustAnchor => write!(f, "trust anchor missing or not PEM"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    InvalidSsid,
    InvalidPassword,
    InvalidBrokerUrl,
    InvalidTopic,
    /// A numeric field failed range validation.
    /// The `&'static str` names the field.
    OutOfRange(&'static str),
    /// A string value does not fit its fixed-capacity buffer.
    TooLong(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::InvalidBrokerUrl => write!(f, "broker URL must use mqtts:// or wss://"),
            Self::InvalidTopic => write!(f, "topic must be non-empty without wildcards"),
            Self::OutOfRange(field) => write!(f, "{field} out of range"),
            Self::TooLong(field) => write!(f, "{field} too long"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
