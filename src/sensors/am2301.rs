//! AM2301 / DHT22 single-wire temperature and humidity sensor.
//!
//! The host pulls the line low for ≥1 ms, releases it, and the sensor
//! answers with an 80 µs low / 80 µs high preamble followed by 40 bits.
//! Each bit is a ~50 µs low followed by a high pulse whose length encodes
//! the value (26–28 µs = 0, ~70 µs = 1).
//!
//! Frame layout (big endian):
//!
//! | Byte | Content                                      |
//! |------|----------------------------------------------|
//! | 0–1  | relative humidity × 10                       |
//! | 2–3  | temperature × 10, bit 15 = sign              |
//! | 4    | low byte of the sum of bytes 0–3 (checksum)  |
//!
//! ## Dual-target design
//!
//! On ESP-IDF: bit-bangs the data GPIO with interrupts masked; the level
//! sequencing lives in [`capture_pulses`] over a [`DataLine`], so it also
//! runs against synthetic waveforms on host.
//! On host/test: encodes a frame from static atomics and decodes it, so
//! the simulation exercises the same decoder.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use crate::app::ports::{ClimateReading, ClimateSensor};
use crate::error::SensorError;

/// Bits in one frame.
pub const FRAME_BITS: usize = 40;

/// High pulses longer than this are a `1` bit (µs).
pub const ONE_THRESHOLD_US: u32 = 50;

#[cfg(not(target_os = "espidf"))]
static SIM_TEMP_DECI: AtomicI32 = AtomicI32::new(231);
#[cfg(not(target_os = "espidf"))]
static SIM_HUMIDITY_DECI: AtomicU32 = AtomicU32::new(550);
#[cfg(not(target_os = "espidf"))]
static SIM_TIMEOUT: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
/// Inject the reading the simulated sensor reports.
pub fn sim_set_climate(temperature_c: f32, humidity_pct: f32) {
    SIM_TEMP_DECI.store((temperature_c * 10.0).round() as i32, Ordering::Relaxed);
    SIM_HUMIDITY_DECI.store((humidity_pct * 10.0).round().max(0.0) as u32, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
/// Make the simulated sensor stop answering.
pub fn sim_set_timeout(timeout: bool) {
    SIM_TIMEOUT.store(timeout, Ordering::Relaxed);
}

// ── Frame decoding ───────────────────────────────────────────

/// Decode a 5-byte frame into a reading.
///
/// An all-zero frame carries a valid checksum but is what a line that
/// never went high produces, so it is rejected.
pub fn decode_frame(frame: &[u8; 5]) -> Result<ClimateReading, SensorError> {
    if frame.iter().all(|&b| b == 0) {
        return Err(SensorError::Checksum);
    }

    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(SensorError::Checksum);
    }

    let humidity = u16::from_be_bytes([frame[0], frame[1]]);
    let magnitude = u16::from_be_bytes([frame[2] & 0x7F, frame[3]]);
    let temp_deci = if frame[2] & 0x80 != 0 {
        -i32::from(magnitude)
    } else {
        i32::from(magnitude)
    };

    Ok(ClimateReading {
        temperature_c: temp_deci as f32 / 10.0,
        humidity_pct: f32::from(humidity) / 10.0,
    })
}

/// Assemble a frame from the 40 measured high-pulse widths (µs).
pub fn frame_from_pulses(high_us: &[u32; FRAME_BITS]) -> [u8; 5] {
    let mut frame = [0u8; 5];
    for (i, &width) in high_us.iter().enumerate() {
        if width > ONE_THRESHOLD_US {
            frame[i / 8] |= 0x80 >> (i % 8);
        }
    }
    frame
}

/// Encode a reading the way the sensor would put it on the wire.
pub fn encode_frame(temp_deci: i32, humidity_deci: u16) -> [u8; 5] {
    let [h0, h1] = humidity_deci.to_be_bytes();
    let magnitude = temp_deci.unsigned_abs().min(0x7FFF) as u16;
    let [mut t0, t1] = magnitude.to_be_bytes();
    if temp_deci < 0 {
        t0 |= 0x80;
    }
    let sum = h0.wrapping_add(h1).wrapping_add(t0).wrapping_add(t1);
    [h0, h1, t0, t1, sum]
}

// ── Driver ───────────────────────────────────────────────────

pub struct Am2301 {
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    gpio: i32,
}

impl Am2301 {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    #[cfg(target_os = "espidf")]
    fn read_frame(&mut self) -> Result<[u8; 5], SensorError> {
        use esp_idf_svc::sys::*;

        let pin = self.gpio;

        // SAFETY: the data pin is owned by this driver; raw GPIO calls on a
        // valid pin number have no other preconditions.
        unsafe {
            gpio_set_direction(pin, gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD);
            gpio_set_level(pin, 0);
            esp_rom_delay_us(1_100);
        }

        let pulses = esp_idf_svc::hal::interrupt::free(|| {
            // SAFETY: as above.
            unsafe {
                gpio_set_level(pin, 1);
                esp_rom_delay_us(30);
            }
            capture_pulses(&mut GpioLine(pin))
        })?;

        Ok(frame_from_pulses(&pulses))
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_frame(&mut self) -> Result<[u8; 5], SensorError> {
        if SIM_TIMEOUT.load(Ordering::Relaxed) {
            return Err(SensorError::Timeout);
        }
        let temp = SIM_TEMP_DECI.load(Ordering::Relaxed);
        let humidity = SIM_HUMIDITY_DECI.load(Ordering::Relaxed).min(u32::from(u16::MAX)) as u16;
        Ok(encode_frame(temp, humidity))
    }
}

impl ClimateSensor for Am2301 {
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        let frame = self.read_frame()?;
        decode_frame(&frame)
    }
}

// ── Line capture ─────────────────────────────────────────────

/// Level and time source for the data line.
pub trait DataLine {
    fn is_high(&mut self) -> bool;
    /// Microseconds since an arbitrary origin.
    fn now_us(&mut self) -> u64;
}

/// Spin while the line stays at `level`; returns how long it did (µs).
/// Returns 0 at once if the line is already at the other level.
fn wait_while<L: DataLine>(line: &mut L, level: bool, timeout_us: u32) -> Result<u32, SensorError> {
    let start = line.now_us();
    loop {
        let elapsed = line.now_us().saturating_sub(start) as u32;
        if line.is_high() != level {
            return Ok(elapsed);
        }
        if elapsed > timeout_us {
            return Err(SensorError::Timeout);
        }
    }
}

/// Follow the sensor's answer after the host released the line and
/// return the 40 high-pulse widths.
///
/// The sensor pulls the line low 20–40 µs after release, so at entry the
/// line may still be high or already inside the low preamble.
pub fn capture_pulses<L: DataLine>(line: &mut L) -> Result<[u32; FRAME_BITS], SensorError> {
    wait_while(line, true, 100)?;
    wait_while(line, false, 100)?;
    wait_while(line, true, 100)?;

    let mut pulses = [0u32; FRAME_BITS];
    for width in &mut pulses {
        wait_while(line, false, 75)?;
        *width = wait_while(line, true, 100)?;
    }
    Ok(pulses)
}

#[cfg(target_os = "espidf")]
struct GpioLine(i32);

#[cfg(target_os = "espidf")]
impl DataLine for GpioLine {
    fn is_high(&mut self) -> bool {
        // SAFETY: reading a configured input.
        unsafe { esp_idf_svc::sys::gpio_get_level(self.0) != 0 }
    }

    fn now_us(&mut self) -> u64 {
        // SAFETY: the monotonic timer has no preconditions.
        unsafe { esp_idf_svc::sys::esp_timer_get_time() as u64 }
    }
}

// ── Tests ────────────────────────────────────────────────────
