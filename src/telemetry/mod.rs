//! Telemetry path: payload encoding, trust anchor and the collector session.

pub mod message;
pub mod publisher;
pub mod trust_anchor;

pub use message::{SensorSample, TelemetryMessage};
pub use publisher::{Publisher, PublisherStats, SessionState, SubmitOutcome};
pub use trust_anchor::TrustAnchor;
