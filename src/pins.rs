//! GPIO / peripheral assignments for the travel-node board.
//!
//! Single source of truth: the sensor drivers and the sampling loop take
//! their pin and channel numbers from here.

// ---------------------------------------------------------------------------
// Climate sensor (AM2301 / DHT22, single-wire)
// ---------------------------------------------------------------------------

/// Open-drain data line, external 4.7 kΩ pull-up.
pub const DHT_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Soil moisture probe (capacitive, analog)
// ---------------------------------------------------------------------------

/// ADC1 channel 6 (GPIO 34 on ESP32).
pub const SOIL_ADC_CHANNEL: u8 = 6;
/// ADC attenuation (11 dB → 0 – 3.1 V range).
pub const SOIL_ADC_ATTEN: u32 = 3; // adc_atten_t::ADC_ATTEN_DB_11
