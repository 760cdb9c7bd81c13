//! Secure telemetry publisher.
//!
//! Owns the collector session.  The transport runs its own task and
//! reports session events through a callback; the session state is shared
//! with that callback through an atomic cell so `submit` on the sampling
//! thread never takes a lock.
//!
//! Delivery is best effort: while the session is not connected `submit`
//! drops the message and counts it.  Reconnection is left entirely to the
//! transport.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::app::events::SessionEvent;
use crate::app::ports::{Endpoint, Qos, SessionHandler, TransportPort};
use crate::error::{CommsError, Error};
use crate::telemetry::TrustAnchor;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Uninitialized = 0,
    Starting = 1,
    Connected = 2,
    Disconnected = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Starting,
            2 => Self::Connected,
            3 => Self::Disconnected,
            _ => Self::Uninitialized,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Starting => write!(f, "Starting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Session state cell shared with the transport callback.
#[derive(Debug)]
struct SessionCell(AtomicU8);

impl SessionCell {
    fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn apply(&self, event: SessionEvent) {
        match event {
            SessionEvent::BeforeConnect => {
                self.set(SessionState::Starting);
                debug!("MQTT: connecting");
            }
            SessionEvent::Connected => {
                self.set(SessionState::Connected);
                info!("MQTT: connected to collector");
            }
            SessionEvent::Disconnected => {
                self.set(SessionState::Disconnected);
                warn!("MQTT: disconnected, transport will reconnect");
            }
            SessionEvent::Error(code) => {
                warn!("MQTT: transport error (rc={code}), session {}", self.get());
            }
            SessionEvent::Published(id) => {
                debug!("MQTT: message {id} acknowledged");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Result of a [`Publisher::submit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Handed to the transport outbox with this message id.
    Enqueued(u32),
    /// Session not connected; message discarded.
    Dropped,
    /// The transport refused the message.
    Failed,
}

/// Delivery counters since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub enqueued: u32,
    pub dropped: u32,
    pub failed: u32,
}

pub struct Publisher<T: TransportPort> {
    transport: T,
    session: Arc<SessionCell>,
    started: bool,
    stats: PublisherStats,
}

impl<T: TransportPort> Publisher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            session: Arc::new(SessionCell(AtomicU8::new(SessionState::Uninitialized as u8))),
            started: false,
            stats: PublisherStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.get()
    }

    pub fn stats(&self) -> PublisherStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the collector session.  Call only once the link is ready.
    ///
    /// A second call after a successful start is a no-op.
    pub fn start(&mut self, endpoint: &Endpoint<'_>, trust_anchor: TrustAnchor) -> Result<(), Error> {
        if self.started {
            warn!("MQTT: session already started, ignoring");
            return Ok(());
        }

        // Set before opening: the transport may report events from inside `open`.
        self.session.set(SessionState::Starting);
        let cell = Arc::clone(&self.session);
        let handler: SessionHandler = Box::new(move |event| cell.apply(event));

        if let Err(e) = self.transport.open(endpoint, trust_anchor, handler) {
            self.session.set(SessionState::Uninitialized);
            error!("MQTT: {e}");
            return Err(CommsError::SessionStartFailed.into());
        }

        self.started = true;
        info!("MQTT: session started ({})", endpoint.url);
        Ok(())
    }

    /// Apply a session event.  The transport callback does the same thing
    /// from its own task.
    pub fn on_session_event(&self, event: SessionEvent) {
        self.session.apply(event);
    }

    /// Hand `payload` to the transport without waiting on the network.
    pub fn submit(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> SubmitOutcome {
        let state = self.session.get();
        if state != SessionState::Connected {
            self.stats.dropped = self.stats.dropped.wrapping_add(1);
            warn!("MQTT: session {state}, dropping message ({} dropped)", self.stats.dropped);
            return SubmitOutcome::Dropped;
        }

        match self.transport.publish(topic, payload, qos, retain) {
            Ok(id) => {
                self.stats.enqueued = self.stats.enqueued.wrapping_add(1);
                debug!("MQTT: queued message {id} on {topic} (qos {})", qos.level());
                SubmitOutcome::Enqueued(id)
            }
            Err(e) => {
                self.stats.failed = self.stats.failed.wrapping_add(1);
                warn!("MQTT: {e}");
                SubmitOutcome::Failed
            }
        }
    }
}
