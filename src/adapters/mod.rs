//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements       | Connects to                 |
//! |-------------|------------------|-----------------------------|
//! | `wifi`      | NetworkPort      | ESP-IDF Wi-Fi STA           |
//! | `mqtt`      | TransportPort    | esp-mqtt over TLS           |
//! | `time`      | MonotonicClock   | ESP32 system timer          |
//! |             | DelayNs          | FreeRTOS delay              |
//! | `device_id` | (none)           | eFuse factory MAC           |
//!
//! Sensor drivers live in [`crate::sensors`].

pub mod device_id;
pub mod mqtt;
pub mod time;
pub mod wifi;
