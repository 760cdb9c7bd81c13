//! Monotonic clock and blocking delay.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic);
//!   delays use `FreeRtos` (`esp-idf-hal`).
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` and
//!   `std::thread::sleep` for host-side simulation.

use crate::app::ports::MonotonicClock;

/// Time since boot.
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Seconds since boot (monotonic).
    pub fn uptime_secs(&self) -> u64 {
        self.uptime_us() / 1_000_000
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl MonotonicClock for SystemClock {
    fn now_us(&self) -> u64 {
        self.uptime_us()
    }
}

/// Blocking delay for the sampling loop.
#[cfg(target_os = "espidf")]
pub type LoopDelay = esp_idf_svc::hal::delay::FreeRtos;

/// Blocking delay for the sampling loop.
#[cfg(not(target_os = "espidf"))]
pub type LoopDelay = StdDelay;

/// The delay the sampling loop sleeps on.
#[cfg(target_os = "espidf")]
pub fn loop_delay() -> LoopDelay {
    esp_idf_svc::hal::delay::FreeRtos
}

#[cfg(not(target_os = "espidf"))]
pub fn loop_delay() -> LoopDelay {
    StdDelay
}

/// `std::thread::sleep` behind the embedded-hal delay trait.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::delay::DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
