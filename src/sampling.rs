//! Sampling loop: the agent's only active control flow.
//!
//! Every cycle reads both sensors, validates the readings, encodes a
//! [`TelemetryMessage`] when both succeeded and hands it to the
//! [`Publisher`].  Failures are logged and the cycle is skipped; nothing
//! stops the loop.
//!
//! ```text
//!   ┌─ read climate ─┐
//!   │                ├─▶ validate ─▶ encode ─▶ submit ─▶ sleep ─┐
//!   └─ read soil ────┘                                          │
//!   ▲                                                           │
//!   └───────────────────────────────────────────────────────────┘
//! ```

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use heapless::String;
use log::{error, info};

use crate::app::ports::{ClimateReading, ClimateSensor, MonotonicClock, Qos, SoilSensor, TransportPort};
use crate::config::{AgentConfig, Cadence, MAX_TOPIC_LEN};
use crate::error::{ESP_OK, SensorError};
use crate::pins;
use crate::telemetry::{Publisher, SensorSample, SubmitOutcome, TelemetryMessage};

// ---------------------------------------------------------------------------
// Plausibility limits (AM2301 datasheet, 12-bit ADC)
// ---------------------------------------------------------------------------

pub const TEMP_MIN_C: f32 = -40.0;
pub const TEMP_MAX_C: f32 = 80.0;
pub const HUMIDITY_MIN_PCT: f32 = 0.0;
pub const HUMIDITY_MAX_PCT: f32 = 100.0;
pub const SOIL_RAW_MAX: i32 = 4095;

pub fn validate_climate(r: ClimateReading) -> Result<ClimateReading, SensorError> {
    let temp_ok = r.temperature_c.is_finite() && (TEMP_MIN_C..=TEMP_MAX_C).contains(&r.temperature_c);
    let hum_ok = r.humidity_pct.is_finite() && (HUMIDITY_MIN_PCT..=HUMIDITY_MAX_PCT).contains(&r.humidity_pct);
    if temp_ok && hum_ok {
        Ok(r)
    } else {
        Err(SensorError::OutOfRange)
    }
}

pub fn validate_soil(raw: i32) -> Result<i32, SensorError> {
    if (0..=SOIL_RAW_MAX).contains(&raw) {
        Ok(raw)
    } else {
        Err(SensorError::OutOfRange)
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A message was built and handed to the publisher.
    Submitted(SubmitOutcome),
    /// At least one read failed; codes are ESP-IDF style (0 = ok).
    Skipped { climate: i32, soil: i32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub cycles: u32,
    pub published: u32,
    pub skipped: u32,
    pub dropped: u32,
}

pub struct SamplingLoop<C, S, T, D, K>
where
    C: ClimateSensor,
    S: SoilSensor,
    T: TransportPort,
    D: DelayNs,
    K: MonotonicClock,
{
    climate: C,
    soil: S,
    publisher: Publisher<T>,
    delay: D,
    clock: K,
    topic: String<MAX_TOPIC_LEN>,
    interval: Duration,
    cadence: Cadence,
    soil_channel: u8,
    stats_every: u32,
    /// Start of the current fixed-rate period (µs).
    anchor_us: Option<u64>,
    stats: SamplerStats,
}

impl<C, S, T, D, K> SamplingLoop<C, S, T, D, K>
where
    C: ClimateSensor,
    S: SoilSensor,
    T: TransportPort,
    D: DelayNs,
    K: MonotonicClock,
{
    pub fn new(config: &AgentConfig, climate: C, soil: S, publisher: Publisher<T>, delay: D, clock: K) -> Self {
        Self {
            climate,
            soil,
            publisher,
            delay,
            clock,
            topic: config.collector.topic.clone(),
            interval: config.sample_interval(),
            cadence: config.sampling.cadence,
            soil_channel: pins::SOIL_ADC_CHANNEL,
            stats_every: config.sampling.stats_every_cycles,
            anchor_us: None,
            stats: SamplerStats::default(),
        }
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    pub fn publisher(&self) -> &Publisher<T> {
        &self.publisher
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Run forever.
    pub fn run(&mut self) -> ! {
        info!(
            "Sampler: every {}ms ({:?}) → {}",
            self.interval.as_millis(),
            self.cadence,
            self.topic
        );
        loop {
            self.step();
        }
    }

    /// One cycle followed by the cadence sleep.
    pub fn step(&mut self) -> CycleOutcome {
        if self.anchor_us.is_none() {
            self.anchor_us = Some(self.clock.now_us());
        }

        let outcome = self.run_cycle();
        self.sleep();
        outcome
    }

    /// Read, validate, encode and submit, without sleeping.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.stats.cycles = self.stats.cycles.wrapping_add(1);

        let climate = self.climate.read().and_then(validate_climate);
        let soil = self.soil.read(self.soil_channel).and_then(validate_soil);

        let sample = SensorSample {
            temperature: climate.as_ref().ok().map(|r| r.temperature_c),
            humidity: climate.as_ref().ok().map(|r| r.humidity_pct),
            soil_raw: soil.as_ref().ok().copied(),
        };

        let outcome = match TelemetryMessage::from_sample(&sample) {
            Some(msg) => {
                info!("Sampler: {msg}");
                let out = self
                    .publisher
                    .submit(&self.topic, msg.as_bytes(), Qos::AtLeastOnce, false);
                match out {
                    SubmitOutcome::Enqueued(_) => self.stats.published = self.stats.published.wrapping_add(1),
                    SubmitOutcome::Dropped | SubmitOutcome::Failed => {
                        self.stats.dropped = self.stats.dropped.wrapping_add(1);
                    }
                }
                CycleOutcome::Submitted(out)
            }
            None => {
                let climate_code = climate.err().map_or(ESP_OK, SensorError::code);
                let soil_code = soil.err().map_or(ESP_OK, SensorError::code);
                error!("Sensor read error (climate: {climate_code}, soil: {soil_code})");
                self.stats.skipped = self.stats.skipped.wrapping_add(1);
                CycleOutcome::Skipped {
                    climate: climate_code,
                    soil: soil_code,
                }
            }
        };

        if self.stats_every != 0 && self.stats.cycles % self.stats_every == 0 {
            let s = self.stats;
            info!(
                "Sampler: {} cycles, {} published, {} skipped, {} dropped",
                s.cycles, s.published, s.skipped, s.dropped
            );
        }

        outcome
    }

    fn sleep(&mut self) {
        let period_us = self.interval.as_micros() as u64;
        match self.cadence {
            Cadence::AfterWork => sleep_us(&mut self.delay, period_us),
            Cadence::FixedRate => {
                let anchor = self.anchor_us.unwrap_or_else(|| self.clock.now_us());
                let deadline = anchor.saturating_add(period_us);
                let now = self.clock.now_us();
                if now < deadline {
                    sleep_us(&mut self.delay, deadline - now);
                    self.anchor_us = Some(deadline);
                } else {
                    // Overran the period: start the next cycle now.
                    self.anchor_us = Some(now);
                }
            }
        }
    }
}

fn sleep_us<D: DelayNs>(delay: &mut D, us: u64) {
    let ms = us / 1_000;
    let rem = (us % 1_000) as u32;
    if ms > 0 {
        delay.delay_ms(ms.min(u64::from(u32::MAX)) as u32);
    }
    if rem > 0 {
        delay.delay_us(rem);
    }
}
