//! Sensor drivers.
//!
//! | Driver      | Implements      | Hardware                      |
//! |-------------|-----------------|-------------------------------|
//! | `am2301`    | ClimateSensor   | AM2301 / DHT22 on one GPIO    |
//! | `soil`      | SoilSensor      | Capacitive probe on ADC1      |

pub mod am2301;
pub mod soil;

pub use am2301::Am2301;
pub use soil::SoilProbe;
