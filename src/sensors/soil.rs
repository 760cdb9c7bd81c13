//! Capacitive soil-moisture probe on ADC1.
//!
//! Reports the raw 12-bit conversion; no calibration is applied.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: the ADC1 one-shot unit and the probe's channel are
//! configured once in [`SoilProbe::new`] and released on drop.
//! On host/test: reads from a static atomic for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicI32, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
use log::info;

use crate::app::ports::SoilSensor;
use crate::error::SensorError;
#[cfg(target_os = "espidf")]
use crate::error::ESP_ERR_INVALID_ARG;

#[cfg(not(target_os = "espidf"))]
static SIM_SOIL_RAW: AtomicI32 = AtomicI32::new(1820);

/// Inject the raw value the simulated probe reports.  Negative values
/// make the read fail with that driver code.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_soil_raw(raw: i32) {
    SIM_SOIL_RAW.store(raw, Ordering::Relaxed);
}

pub struct SoilProbe {
    channel: u8,
    #[cfg(target_os = "espidf")]
    handle: adc_oneshot_unit_handle_t,
}

impl SoilProbe {
    /// Acquire ADC1 and configure `channel` with `atten`.
    #[cfg(target_os = "espidf")]
    pub fn new(channel: u8, atten: u32) -> Result<Self, SensorError> {
        let init_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };
        let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();
        // SAFETY: init_cfg and handle outlive the call; the driver writes
        // the handle on success.
        let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(SensorError::Driver(ret));
        }

        let chan_cfg = adc_oneshot_chan_cfg_t {
            atten,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        // SAFETY: handle was returned by adc_oneshot_new_unit above.
        let ret = unsafe { adc_oneshot_config_channel(handle, u32::from(channel), &chan_cfg) };
        if ret != ESP_OK as i32 {
            // SAFETY: release the unit we just created.
            unsafe { adc_oneshot_del_unit(handle) };
            return Err(SensorError::Driver(ret));
        }

        info!("Soil: ADC1 CH{channel} configured (atten {atten})");
        Ok(Self { channel, handle })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(channel: u8, atten: u32) -> Result<Self, SensorError> {
        info!("Soil(sim): CH{channel} (atten {atten})");
        Ok(Self { channel })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }
}

impl SoilSensor for SoilProbe {
    #[cfg(target_os = "espidf")]
    fn read(&mut self, channel: u8) -> Result<i32, SensorError> {
        if channel != self.channel {
            return Err(SensorError::Driver(ESP_ERR_INVALID_ARG));
        }
        let mut raw: i32 = 0;
        // SAFETY: handle is valid until drop; the loop owns the probe.
        let ret = unsafe { adc_oneshot_read(self.handle, u32::from(channel), &mut raw) };
        if ret != ESP_OK as i32 {
            return Err(SensorError::Driver(ret));
        }
        Ok(raw)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read(&mut self, channel: u8) -> Result<i32, SensorError> {
        if channel != self.channel {
            return Err(SensorError::Driver(crate::error::ESP_ERR_INVALID_ARG));
        }
        match SIM_SOIL_RAW.load(Ordering::Relaxed) {
            code if code < 0 => Err(SensorError::Driver(code)),
            raw => Ok(raw),
        }
    }
}

#[cfg(target_os = "espidf")]
impl Drop for SoilProbe {
    fn drop(&mut self) {
        // SAFETY: handle came from adc_oneshot_new_unit and is released once.
        unsafe { adc_oneshot_del_unit(self.handle) };
    }
}
