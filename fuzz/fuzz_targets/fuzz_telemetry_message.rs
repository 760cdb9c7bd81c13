//! Fuzz target: `TelemetryMessage::from_sample`
//!
//! Arbitrary float bit patterns (NaN, infinities, huge magnitudes) must
//! either be rejected or encode to valid JSON within the payload bound.
//!
//! cargo fuzz run fuzz_telemetry_message

#![no_main]

use libfuzzer_sys::fuzz_target;
use plantnode::telemetry::message::MAX_MESSAGE_LEN;
use plantnode::telemetry::{SensorSample, TelemetryMessage};

fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }
    let word = |i: usize| u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);

    let sample = SensorSample {
        temperature: Some(f32::from_bits(word(0))),
        humidity: Some(f32::from_bits(word(4))),
        soil_raw: Some(word(8) as i32),
    };

    if let Some(msg) = TelemetryMessage::from_sample(&sample) {
        assert!(msg.as_str().len() <= MAX_MESSAGE_LEN);
        assert!(msg.as_str().starts_with('{') && msg.as_str().ends_with('}'));
        assert!(!msg.as_str().contains("NaN") && !msg.as_str().contains("inf"));
    }
});
