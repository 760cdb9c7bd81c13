//! Wi-Fi station adapter.
//!
//! Implements [`NetworkPort`] and turns driver notifications into
//! [`LinkEvent`]s for the [`Supervisor`].
//!
//! - **`target_os = "espidf"`**: wraps `EspWifi` in STA mode.  Delayed
//!   attempts use a one-shot `EspTaskTimerService` timer that calls
//!   `esp_wifi_connect()`; Wi-Fi and IP events are subscribed on the
//!   system event loop and forwarded to the supervisor.
//! - **`not(target_os = "espidf")`**: simulated station: events are
//!   pushed into a channel drained by a host "event loop" thread, and
//!   every 10th attempt fails to exercise the retry path.

use core::time::Duration;
#[cfg(target_os = "espidf")]
use std::sync::{Arc, Mutex, PoisonError};

use log::info;

use crate::app::ports::{NetworkError, NetworkPort};
use crate::config::NetworkConfig;
#[cfg(target_os = "espidf")]
use crate::link::Supervisor;

// ───────────────────────────────────────────────────────────────
// ESP-IDF station
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use super::*;

    use core::net::Ipv4Addr;

    use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::netif::IpEvent;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sys::{EspError, esp_wifi_connect};
    use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};
    use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent};
    use log::{debug, warn};

    use crate::app::events::LinkEvent;
    use crate::error::ESP_ERR_INVALID_ARG;

    pub struct WifiStation {
        wifi: EspWifi<'static>,
        timers: EspTaskTimerService,
        retry_timer: Option<EspTimer<'static>>,
    }

    impl WifiStation {
        pub fn new(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: EspDefaultNvsPartition,
            network: &NetworkConfig,
        ) -> Result<Self, NetworkError> {
            let mut wifi = EspWifi::new(modem, sysloop, Some(nvs)).map_err(driver)?;

            let auth_method = if network.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let client = ClientConfiguration {
                ssid: network
                    .ssid
                    .as_str()
                    .try_into()
                    .map_err(|_| NetworkError::Driver(ESP_ERR_INVALID_ARG))?,
                password: network
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|_| NetworkError::Driver(ESP_ERR_INVALID_ARG))?,
                auth_method,
                ..Default::default()
            };
            wifi.set_configuration(&Configuration::Client(client)).map_err(driver)?;
            info!("WiFi: STA configured for '{}'", network.ssid);

            Ok(Self {
                wifi,
                timers: EspTaskTimerService::new().map_err(driver)?,
                retry_timer: None,
            })
        }

        /// Address currently assigned to the station interface.
        pub fn ip_address(&self) -> Option<Ipv4Addr> {
            self.wifi.sta_netif().get_ip_info().ok().map(|info| info.ip)
        }
    }

    impl NetworkPort for WifiStation {
        fn start(&mut self) -> Result<(), NetworkError> {
            self.wifi.start().map_err(driver)
        }

        fn connect(&mut self, after: Duration) -> Result<(), NetworkError> {
            // Replacing the handle cancels a pending attempt.
            self.retry_timer = None;

            if after.is_zero() {
                return self.wifi.connect().map_err(driver);
            }

            let timer = self
                .timers
                .timer(|| {
                    // SAFETY: esp_wifi_connect is safe to call from any task
                    // once the driver is started.
                    let rc = unsafe { esp_wifi_connect() };
                    if rc != 0 {
                        warn!("WiFi: delayed connect failed (rc={rc})");
                    }
                })
                .map_err(|_| NetworkError::TimerUnavailable)?;
            timer.after(after).map_err(|_| NetworkError::TimerUnavailable)?;
            self.retry_timer = Some(timer);
            Ok(())
        }
    }

    fn driver(e: EspError) -> NetworkError {
        NetworkError::Driver(e.code())
    }

    /// Keeps the event-loop subscriptions alive.
    pub struct LinkEventSubscription {
        _wifi: EspSubscription<'static, System>,
        _ip: EspSubscription<'static, System>,
    }

    /// Route Wi-Fi/IP events from the system event loop to the supervisor.
    ///
    /// Both callbacks run on the single system event-loop task, so the
    /// supervisor lock is never contended by two events at once.
    pub fn forward_link_events(
        sysloop: &EspSystemEventLoop,
        supervisor: Arc<Mutex<Supervisor<WifiStation>>>,
    ) -> Result<LinkEventSubscription, EspError> {
        let sup = Arc::clone(&supervisor);
        let wifi_sub = sysloop.subscribe::<WifiEvent, _>(move |event| {
            let link_event = match event {
                WifiEvent::StaStarted { .. } => LinkEvent::InterfaceStarted,
                WifiEvent::StaDisconnected { .. } => LinkEvent::Disconnected { reason: 0 },
                other => {
                    debug!("WiFi: event {other:?}");
                    return;
                }
            };
            sup.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .on_event(link_event);
        })?;

        let ip_sub = sysloop.subscribe::<IpEvent, _>(move |event| {
            if let IpEvent::DhcpIpAssigned { .. } = event {
                let mut sup = supervisor.lock().unwrap_or_else(PoisonError::into_inner);
                match sup.network().ip_address() {
                    Some(ip) => sup.on_event(LinkEvent::AddressAcquired(ip)),
                    None => warn!("WiFi: DHCP reported an address but netif has none"),
                }
            }
        })?;

        Ok(LinkEventSubscription {
            _wifi: wifi_sub,
            _ip: ip_sub,
        })
    }
}

#[cfg(target_os = "espidf")]
pub use platform::{LinkEventSubscription, WifiStation, forward_link_events};

// ───────────────────────────────────────────────────────────────
// Simulated station
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use super::*;

    use core::net::Ipv4Addr;
    use std::sync::mpsc::{Receiver, Sender, channel};
    use std::thread;

    use log::warn;

    use crate::app::events::LinkEvent;

    /// 802.11 reason code for "no AP found".
    const REASON_NO_AP_FOUND: u16 = 201;

    pub const SIM_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 2);

    pub struct WifiStation {
        ssid: heapless::String<32>,
        events: Sender<LinkEvent>,
        started: bool,
        sim_connect_counter: u32,
        /// Simulated association latency.
        latency: Duration,
    }

    impl WifiStation {
        /// Returns the station and the receiving end of its event stream.
        pub fn new(network: &NetworkConfig) -> (Self, Receiver<LinkEvent>) {
            let (tx, rx) = channel();
            let station = Self {
                ssid: network.ssid.clone(),
                events: tx,
                started: false,
                sim_connect_counter: 0,
                latency: Duration::from_millis(100),
            };
            (station, rx)
        }

        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        pub fn connect_attempts(&self) -> u32 {
            self.sim_connect_counter
        }
    }

    impl NetworkPort for WifiStation {
        fn start(&mut self) -> Result<(), NetworkError> {
            self.started = true;
            info!("WiFi(sim): STA started");
            let _ = self.events.send(LinkEvent::InterfaceStarted);
            Ok(())
        }

        fn connect(&mut self, after: Duration) -> Result<(), NetworkError> {
            if !self.started {
                return Err(NetworkError::NotStarted);
            }
            self.sim_connect_counter = self.sim_connect_counter.wrapping_add(1);
            let attempt = self.sim_connect_counter;
            let fail = attempt % 10 == 3;
            let ssid = self.ssid.clone();
            let tx = self.events.clone();
            let wait = after + self.latency;

            thread::spawn(move || {
                thread::sleep(wait);
                let event = if fail {
                    warn!("WiFi(sim): '{ssid}' not found (attempt {attempt})");
                    LinkEvent::Disconnected {
                        reason: REASON_NO_AP_FOUND,
                    }
                } else {
                    info!("WiFi(sim): associated with '{ssid}' (attempt {attempt})");
                    LinkEvent::AddressAcquired(SIM_ADDRESS)
                };
                let _ = tx.send(event);
            });
            Ok(())
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub use sim::{SIM_ADDRESS, WifiStation};

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
