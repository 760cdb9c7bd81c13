//! Telemetry payload.
//!
//! Wire format (field order fixed, one decimal for the climate values):
//!
//! ```text
//! {"temp": 23.5, "humidity": 60.0, "soil_raw": 1820}
//! ```

use core::fmt::Write as _;
use std::io;

use heapless::String;
use log::warn;
use serde::Serialize;

/// Upper bound on an encoded payload.
pub const MAX_MESSAGE_LEN: usize = 128;

/// One cycle's readings.  A field is `None` when its read failed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSample {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub soil_raw: Option<i32>,
}

impl SensorSample {
    pub fn is_complete(&self) -> bool {
        self.temperature.is_some() && self.humidity.is_some() && self.soil_raw.is_some()
    }
}

#[derive(Debug, Serialize)]
struct Payload {
    temp: f32,
    humidity: f32,
    soil_raw: i32,
}

/// Encoded JSON payload, only constructible from a complete sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMessage(String<MAX_MESSAGE_LEN>);

impl TelemetryMessage {
    /// Encode `sample`; `None` if any field is absent or not finite.
    pub fn from_sample(sample: &SensorSample) -> Option<Self> {
        let payload = Payload {
            temp: one_decimal(sample.temperature?)?,
            humidity: one_decimal(sample.humidity?)?,
            soil_raw: sample.soil_raw?,
        };

        let mut buf = Vec::with_capacity(MAX_MESSAGE_LEN);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
        if let Err(e) = payload.serialize(&mut ser) {
            warn!("Telemetry: encode failed: {e}");
            return None;
        }

        let text = core::str::from_utf8(&buf).ok()?;
        let mut out = String::new();
        if out.push_str(text).is_err() {
            warn!("Telemetry: payload exceeds {MAX_MESSAGE_LEN} bytes");
            return None;
        }
        Some(Self(out))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl core::fmt::Display for TelemetryMessage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Round to one decimal place the way C's `%.1f` does: the exact binary
/// value is rounded, ties to even.
fn one_decimal(v: f32) -> Option<f32> {
    if !v.is_finite() {
        return None;
    }
    let mut digits: String<48> = String::new();
    write!(digits, "{v:.1}").ok()?;
    digits.parse().ok()
}

/// Compact JSON with a space after `:` and `,`.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}
