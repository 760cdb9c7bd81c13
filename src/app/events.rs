//! Inbound platform events.
//!
//! Adapters translate raw driver notifications (ESP-IDF Wi-Fi/IP events,
//! esp-mqtt callbacks) into these types and hand them to the owning
//! component.  The core never sees a driver type.

use core::fmt;
use core::net::Ipv4Addr;

/// Network-interface lifecycle notifications, consumed by the
/// [`Supervisor`](crate::link::Supervisor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The station interface finished starting.
    InterfaceStarted,
    /// Association was lost or an attempt failed (`reason` is the 802.11
    /// reason code, 0 when unknown).
    Disconnected { reason: u16 },
    /// DHCP assigned an address.
    AddressAcquired(Ipv4Addr),
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterfaceStarted => write!(f, "interface started"),
            Self::Disconnected { reason } => write!(f, "disconnected (reason {reason})"),
            Self::AddressAcquired(ip) => write!(f, "got IP {ip}"),
        }
    }
}

/// Collector session notifications, consumed by the
/// [`Publisher`](crate::telemetry::Publisher).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport is about to (re)connect.
    BeforeConnect,
    Connected,
    Disconnected,
    /// Transport-level error code; the session keeps its current state.
    Error(i32),
    /// A QoS ≥ 1 message was acknowledged.
    Published(u32),
}
