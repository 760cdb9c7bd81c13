//! PlantNode Firmware: Main Entry Point
//!
//! Composition root: builds the adapters, wires them to the three core
//! components and hands control to the sampling loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiStation    MqttTransport    Am2301    SoilProbe           │
//! │  (NetworkPort)  (TransportPort)  (Climate) (Soil)              │
//! │  SystemClock · LoopDelay                                       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  Supervisor ──readiness──▶ Publisher ◀──submit── SamplingLoop  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Startup order: config → trust anchor → Wi-Fi → wait for readiness →
//! MQTT session → sensors → loop.  Any failure before the loop is fatal:
//! the device logs it and restarts; the host simulation exits.
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, anyhow};
use log::{error, info};

use plantnode::Error;
use plantnode::adapters::device_id;
use plantnode::adapters::mqtt::MqttTransport;
use plantnode::adapters::time::{SystemClock, loop_delay};
use plantnode::adapters::wifi::WifiStation;
use plantnode::app::ports::Endpoint;
use plantnode::config::AgentConfig;
use plantnode::link::Supervisor;
use plantnode::pins;
use plantnode::readiness::ReadinessSignal;
use plantnode::sampling::SamplingLoop;
use plantnode::sensors::{Am2301, SoilProbe};
use plantnode::telemetry::{Publisher, TrustAnchor};

// ── Main ──────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    banner();

    let Err(e) = run();
    error!("Fatal: {e:#}, restarting in 5 s");
    esp_idf_svc::hal::delay::FreeRtos::delay_ms(5_000);
    // SAFETY: esp_restart has no preconditions and does not return.
    unsafe { esp_idf_svc::sys::esp_restart() }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    banner();

    let Err(e) = run();
    error!("Fatal: {e:#}");
    Err(e)
}

fn banner() {
    info!("╔══════════════════════════════════════╗");
    info!("║  PlantNode v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
}

// ── Startup ───────────────────────────────────────────────────

/// Returns only on a fatal startup error.
fn run() -> Result<std::convert::Infallible> {
    // ── 1. Configuration + trust material ─────────────────────
    let config = AgentConfig::from_build_env().map_err(Error::from)?;
    config.validate().map_err(Error::from)?;
    let trust_anchor = TrustAnchor::embedded().map_err(Error::from)?;
    info!("Config: SSID '{}', collector {}", config.network.ssid, config.collector.broker_url);

    // ── 2. Connectivity supervisor ────────────────────────────
    let readiness = Arc::new(ReadinessSignal::new());
    let supervisor = start_link(&config, Arc::clone(&readiness))?;

    // Wait on the signal directly: event delivery needs the supervisor lock.
    info!("WiFi: waiting for link (timeout {:?})", config.ready_timeout());
    readiness.wait(config.ready_timeout()).map_err(Error::from)?;
    if let Some(ip) = supervisor.lock().unwrap_or_else(PoisonError::into_inner).address() {
        info!("WiFi: link ready ({ip})");
    }

    // ── 3. Telemetry session ──────────────────────────────────
    let client_id = device_id::client_id(&device_id::read_mac());
    let endpoint = Endpoint {
        url: &config.collector.broker_url,
        client_id: &client_id,
        username: non_empty(&config.collector.username),
        password: non_empty(&config.collector.password),
        reconnect_interval: core::time::Duration::from_millis(u64::from(config.collector.reconnect_interval_ms)),
    };
    let mut publisher = Publisher::new(MqttTransport::new());
    publisher.start(&endpoint, trust_anchor)?;

    // ── 4. Sensors + sampling loop ────────────────────────────
    let climate = Am2301::new(pins::DHT_GPIO);
    let soil = SoilProbe::new(pins::SOIL_ADC_CHANNEL, pins::SOIL_ADC_ATTEN).map_err(Error::from)?;

    let mut sampler = SamplingLoop::new(&config, climate, soil, publisher, loop_delay(), SystemClock::new());
    sampler.run()
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

type SharedSupervisor = Arc<Mutex<Supervisor<WifiStation>>>;

/// Bring up the station and route its events to the supervisor.
#[cfg(target_os = "espidf")]
fn start_link(config: &AgentConfig, readiness: Arc<ReadinessSignal>) -> Result<SharedSupervisor> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use plantnode::adapters::wifi::forward_link_events;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let station = WifiStation::new(peripherals.modem, sysloop.clone(), nvs, &config.network)
        .map_err(|e| anyhow!("WiFi init failed: {e}"))?;
    let supervisor = Arc::new(Mutex::new(Supervisor::new(station, readiness, config.link_retry)));

    // Lives for the whole program, like the supervisor.
    let subscription = forward_link_events(&sysloop, Arc::clone(&supervisor))?;
    core::mem::forget(subscription);

    supervisor
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .start()
        .map_err(|e| anyhow!("WiFi start failed: {e}"))?;
    Ok(supervisor)
}

/// Simulated station; a thread stands in for the system event loop.
#[cfg(not(target_os = "espidf"))]
fn start_link(config: &AgentConfig, readiness: Arc<ReadinessSignal>) -> Result<SharedSupervisor> {
    let (station, events) = WifiStation::new(&config.network);
    let supervisor = Arc::new(Mutex::new(Supervisor::new(station, readiness, config.link_retry)));

    let sup = Arc::clone(&supervisor);
    std::thread::Builder::new()
        .name("sys_evt".into())
        .spawn(move || {
            for event in events {
                sup.lock().unwrap_or_else(PoisonError::into_inner).on_event(event);
            }
        })?;

    supervisor
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .start()
        .map_err(|e| anyhow!("WiFi start failed: {e}"))?;
    Ok(supervisor)
}
