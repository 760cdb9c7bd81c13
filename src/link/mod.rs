//! Connectivity supervisor.
//!
//! Owns the station interface lifecycle and the [`ReadinessSignal`]:
//!
//! ```text
//!            InterfaceStarted            AddressAcquired
//!   ┌──────┐ ───────────────▶ ┌────────────┐ ──────────▶ ┌────┐
//!   │ Down │                  │ Connecting │             │ Up │
//!   └──────┘ ◀─── (retries    └────────────┘ ◀────────── └────┘
//!               exhausted)          ▲        Disconnected
//!                                   └── Disconnected (retry after backoff)
//! ```
//!
//! Readiness is set exactly while the state is `Up`.  Events are applied
//! strictly one at a time (`&mut self`); the composition root serialises
//! the platform event loop and startup behind one mutex.

use core::fmt;
use core::net::Ipv4Addr;
use core::time::Duration;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::app::events::LinkEvent;
use crate::app::ports::{NetworkError, NetworkPort};
use crate::error::Error;
use crate::readiness::ReadinessSignal;
use crate::retry::{Backoff, RetryPolicy};

// ---------------------------------------------------------------------------
// Link state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Down,
    Connecting,
    Up,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Down => write!(f, "Down"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Up => write!(f, "Up"),
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

pub struct Supervisor<N: NetworkPort> {
    network: N,
    state: LinkState,
    readiness: Arc<ReadinessSignal>,
    backoff: Backoff,
    address: Option<Ipv4Addr>,
    /// `start()` has been issued to the driver.
    start_issued: bool,
    /// The driver reported `InterfaceStarted` at least once.
    interface_up: bool,
    /// The retry ceiling was hit; disconnects are ignored until `start()`.
    gave_up: bool,
    /// The driver accepted a connect request whose outcome is not in yet.
    /// `Connecting` without one is stalled and is revived by `start()`,
    /// `InterfaceStarted` or a disconnect.
    attempt_pending: bool,
}

impl<N: NetworkPort> Supervisor<N> {
    pub fn new(network: N, readiness: Arc<ReadinessSignal>, policy: RetryPolicy) -> Self {
        Self::with_backoff(network, readiness, Backoff::new(policy))
    }

    pub fn with_backoff(network: N, readiness: Arc<ReadinessSignal>, backoff: Backoff) -> Self {
        readiness.clear();
        Self {
            network,
            state: LinkState::Down,
            readiness,
            backoff,
            address: None,
            start_issued: false,
            interface_up: false,
            gave_up: false,
            attempt_pending: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Address assigned by the last `AddressAcquired`, while `Up`.
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }

    /// Consecutive failed attempts since the link was last up.
    pub fn retry_attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    pub fn readiness(&self) -> Arc<ReadinessSignal> {
        Arc::clone(&self.readiness)
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Bring the link up.  Idempotent: while an attempt is in flight or
    /// the link is up this issues nothing.  After the retry ceiling was
    /// exhausted it revives the link with an immediate attempt; a stalled
    /// `Connecting` gets the next backoff attempt.
    pub fn start(&mut self) -> Result<(), NetworkError> {
        match self.state {
            LinkState::Down if self.interface_up => {
                info!("WiFi: restarting connection attempts");
                self.gave_up = false;
                self.backoff.reset();
                self.state = LinkState::Connecting;
                self.issue_connect(Duration::ZERO);
            }
            LinkState::Down if !self.start_issued => {
                self.network.start()?;
                self.start_issued = true;
                info!("WiFi: interface starting");
            }
            LinkState::Connecting if !self.attempt_pending => {
                info!("WiFi: no attempt in flight, retrying");
                self.retry();
            }
            state => debug!("WiFi: start ignored ({state})"),
        }
        Ok(())
    }

    /// Apply one link event.
    pub fn on_event(&mut self, event: LinkEvent) {
        let from = self.state;

        match (from, event) {
            (LinkState::Down, LinkEvent::InterfaceStarted) => {
                self.interface_up = true;
                self.gave_up = false;
                self.backoff.reset();
                self.state = LinkState::Connecting;
                info!("WiFi: interface started, connecting");
                self.issue_connect(Duration::ZERO);
            }
            (LinkState::Connecting, LinkEvent::InterfaceStarted) if !self.attempt_pending => {
                self.interface_up = true;
                info!("WiFi: interface started with no attempt in flight, retrying");
                self.retry();
            }
            (_, LinkEvent::InterfaceStarted) => {
                self.interface_up = true;
                debug!("WiFi: interface start ignored ({from})");
            }

            (_, LinkEvent::Disconnected { reason }) => {
                self.readiness.clear();
                self.address = None;
                self.attempt_pending = false;

                if !self.interface_up {
                    debug!("WiFi: disconnect before interface start ignored (reason {reason})");
                    return;
                }
                if self.gave_up {
                    debug!("WiFi: disconnect ignored after giving up (reason {reason})");
                    return;
                }

                warn!("WiFi: disconnected (reason {reason})");
                self.retry();
            }

            (LinkState::Connecting, LinkEvent::AddressAcquired(ip)) => {
                self.state = LinkState::Up;
                self.address = Some(ip);
                self.attempt_pending = false;
                self.backoff.reset();
                self.readiness.set();
                info!("WiFi: got IP {ip}");
            }
            (LinkState::Up, LinkEvent::AddressAcquired(ip)) => {
                self.address = Some(ip);
                info!("WiFi: address changed to {ip}");
            }
            (LinkState::Down, LinkEvent::AddressAcquired(ip)) => {
                warn!("WiFi: address {ip} reported while down, ignored");
            }
        }

        if self.state != from {
            debug!("WiFi: {from} -> {}", self.state);
        }
    }

    /// Block until the link is up or `timeout` elapses (`None` = forever).
    ///
    /// When the supervisor is shared behind a mutex, wait on
    /// [`readiness`](Self::readiness) instead; holding the lock here would
    /// stall event delivery.
    pub fn await_ready(&self, timeout: Option<Duration>) -> Result<(), Error> {
        self.readiness.wait(timeout).map_err(Error::from)
    }

    /// Take the next backoff step: schedule an attempt, or give up at the
    /// ceiling.
    fn retry(&mut self) {
        match self.backoff.next_delay() {
            Some(delay) => {
                self.state = LinkState::Connecting;
                info!("WiFi: retry {} in {}ms", self.backoff.attempts(), delay.as_millis());
                self.issue_connect(delay);
            }
            None => self.give_up(),
        }
    }

    fn give_up(&mut self) {
        self.state = LinkState::Down;
        self.gave_up = true;
        self.attempt_pending = false;
        error!("WiFi: giving up after {} attempts", self.backoff.attempts());
    }

    /// A refused request counts as a failed attempt and the next backoff
    /// step is requested once.  If the driver refuses that too the link
    /// stays stalled until the next event or `start()`.
    fn issue_connect(&mut self, after: Duration) {
        if let Err(e) = self.network.connect(after) {
            warn!("WiFi: connect request failed: {e}");
            let Some(delay) = self.backoff.next_delay() else {
                self.give_up();
                return;
            };
            info!("WiFi: retry {} in {}ms", self.backoff.attempts(), delay.as_millis());
            if let Err(e) = self.network.connect(delay) {
                warn!("WiFi: retry request failed: {e}, waiting for the next event");
                self.attempt_pending = false;
                return;
            }
        }
        self.attempt_pending = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
