//! Port traits: the hexagonal boundary between the agent core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Supervisor / Publisher / SamplingLoop
//! ```
//!
//! Driven adapters (Wi-Fi driver, MQTT client, sensors, clock) implement
//! these traits.  The core consumes them via generics or boxed trait
//! objects, so it never touches hardware directly and runs unchanged on
//! the host with mocks.

use core::fmt;
use core::time::Duration;

use crate::app::events::SessionEvent;
use crate::error::SensorError;
use crate::telemetry::TrustAnchor;

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapter: hardware → core)
// ───────────────────────────────────────────────────────────────

/// One combined temperature/humidity measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    /// Degrees Celsius.
    pub temperature_c: f32,
    /// Relative humidity, percent.
    pub humidity_pct: f32,
}

/// Single-wire temperature/humidity sensor (AM2301 / DHT22 family).
pub trait ClimateSensor {
    fn read(&mut self) -> Result<ClimateReading, SensorError>;
}

/// Analog soil-moisture probe behind a one-shot ADC.
pub trait SoilSensor {
    /// Raw conversion result for `channel` (12-bit: 0–4095).
    fn read(&mut self, channel: u8) -> Result<i32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Network port (driven adapter: core → Wi-Fi driver)
// ───────────────────────────────────────────────────────────────

/// Station-mode network interface.
///
/// Completion is reported asynchronously as
/// [`LinkEvent`](crate::app::events::LinkEvent)s delivered to the
/// supervisor; these calls only *issue* the request.
pub trait NetworkPort {
    /// Bring the interface up.  Emits `InterfaceStarted` when done.
    fn start(&mut self) -> Result<(), NetworkError>;

    /// Issue an association attempt after `after` has elapsed
    /// (`Duration::ZERO` = immediately).  A failed attempt is reported as
    /// `Disconnected`.
    fn connect(&mut self, after: Duration) -> Result<(), NetworkError>;
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: core → MQTT client)
// ───────────────────────────────────────────────────────────────

/// MQTT delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Qos {
    pub const fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

/// Where and as whom to open the collector session.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    /// `mqtts://host:port` or `wss://host/path`.
    pub url: &'a str,
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    /// Interval between the transport's own reconnect attempts.
    pub reconnect_interval: Duration,
}

/// Callback the transport invokes from its own task for every session event.
pub type SessionHandler = Box<dyn FnMut(SessionEvent) + Send + 'static>;

/// Encrypted publish/subscribe session with automatic reconnection.
pub trait TransportPort {
    /// Open the session; the handler is registered before connecting so
    /// no event is missed.
    fn open(
        &mut self,
        endpoint: &Endpoint<'_>,
        trust_anchor: TrustAnchor,
        handler: SessionHandler,
    ) -> Result<(), TransportError>;

    /// Queue a message for delivery without waiting on the network.
    /// Returns the transport's message id.
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retain: bool,
    ) -> Result<u32, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source for fixed-rate scheduling.
pub trait MonotonicClock {
    /// Microseconds since an arbitrary fixed origin.
    fn now_us(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`NetworkPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// Driver rejected the request (ESP-IDF result code).
    Driver(i32),
    /// The interface has not been started.
    NotStarted,
    /// A delayed attempt could not be scheduled.
    TimerUnavailable,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(code) => write!(f, "driver error (rc={code})"),
            Self::NotStarted => write!(f, "interface not started"),
            Self::TimerUnavailable => write!(f, "retry timer unavailable"),
        }
    }
}

/// Errors from [`TransportPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Client construction or connect failed (ESP-IDF result code).
    Open(i32),
    /// The session has not been opened.
    NotOpen,
    /// The outbox rejected the message (full or client stopped).
    Rejected(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(code) => write!(f, "session open failed (rc={code})"),
            Self::NotOpen => write!(f, "session not open"),
            Self::Rejected(code) => write!(f, "publish rejected (rc={code})"),
        }
    }
}
