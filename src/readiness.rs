//! Link readiness signal.
//!
//! A single-writer, multi-waiter binary event: set while the network link
//! is up (station associated and IP address assigned), cleared on loss.
//! Only the [`Supervisor`](crate::link::Supervisor) can write it; anyone
//! holding the `Arc` can observe or wait.

use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch::Watch;
use futures_lite::future::block_on;

use crate::error::CommsError;

/// Concurrent waiters supported by one signal.
pub const MAX_WAITERS: usize = 4;

pub struct ReadinessSignal {
    watch: Watch<CriticalSectionRawMutex, bool, MAX_WAITERS>,
}

impl Default for ReadinessSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ReadinessSignal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReadinessSignal")
            .field("ready", &self.is_set())
            .finish()
    }
}

impl ReadinessSignal {
    pub const fn new() -> Self {
        Self {
            watch: Watch::new(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.watch.sender().try_get() == Some(true)
    }

    pub(crate) fn set(&self) {
        self.watch.sender().send(true);
    }

    pub(crate) fn clear(&self) {
        self.watch.sender().send(false);
    }

    /// Block the calling thread until the signal is set.
    ///
    /// `None` waits indefinitely.  Returns immediately if already set.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), CommsError> {
        let mut rx = self.watch.receiver().ok_or(CommsError::TooManyWaiters)?;
        let ready = rx.get_and(|ready| *ready);

        match timeout {
            None => {
                block_on(ready);
                Ok(())
            }
            Some(t) => {
                let t = embassy_time::Duration::from_micros(t.as_micros() as u64);
                block_on(embassy_time::with_timeout(t, ready))
                    .map(|_| ())
                    .map_err(|_| CommsError::ReadyTimeout)
            }
        }
    }
}
