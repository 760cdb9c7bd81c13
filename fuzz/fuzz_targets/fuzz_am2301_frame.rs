//! Fuzz target: AM2301 pulse/frame decoding
//!
//! Feeds arbitrary pulse widths through `frame_from_pulses` and
//! `decode_frame` and checks that a decoded reading always comes from a
//! frame with a valid checksum and stays within what 16 bits can carry.
//!
//! cargo fuzz run fuzz_am2301_frame

#![no_main]

use libfuzzer_sys::fuzz_target;
use plantnode::sensors::am2301::{FRAME_BITS, decode_frame, frame_from_pulses};

fuzz_target!(|data: &[u8]| {
    let mut pulses = [0u32; FRAME_BITS];
    for (width, byte) in pulses.iter_mut().zip(data) {
        *width = u32::from(*byte);
    }

    let frame = frame_from_pulses(&pulses);
    if let Ok(reading) = decode_frame(&frame) {
        let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        assert_eq!(sum, frame[4], "decoded a frame with a bad checksum");
        assert!(reading.humidity_pct >= 0.0 && reading.humidity_pct <= 6553.5);
        assert!(reading.temperature_c.abs() <= 3276.7);
    }

    // Raw frames straight from the input must never panic either.
    if let Ok(raw) = <[u8; 5]>::try_from(data.get(..5).unwrap_or_default()) {
        let _ = decode_frame(&raw);
    }
});
