//! Mock adapters for integration tests.
//!
//! Each mock records what the core asked of it so tests can assert on the
//! full call history without a radio, a broker or real sensors.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use plantnode::app::events::SessionEvent;
use plantnode::app::ports::{
    ClimateReading, ClimateSensor, Endpoint, MonotonicClock, NetworkError, NetworkPort, Qos,
    SessionHandler, SoilSensor, TransportError, TransportPort,
};
use plantnode::error::SensorError;
use plantnode::telemetry::TrustAnchor;

pub static TEST_PEM: &[u8] = b"-----BEGIN CERTIFICATE-----\nMIIBtest\n-----END CERTIFICATE-----\n\0";

pub fn trust_anchor() -> TrustAnchor {
    TrustAnchor::from_pem(TEST_PEM).unwrap()
}

pub fn endpoint() -> Endpoint<'static> {
    Endpoint {
        url: "mqtts://collector.example.net:8883",
        client_id: "plantnode-a1b2c3",
        username: Some("node"),
        password: Some("secret"),
        reconnect_interval: Duration::from_secs(10),
    }
}

// ── Network ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetCall {
    Start,
    Connect(Duration),
}

/// Records driver requests; never emits events on its own.
#[derive(Default)]
pub struct ScriptedNetwork {
    pub calls: Vec<NetCall>,
    pub fail_start: bool,
    /// Connect requests refused with `TimerUnavailable` before accepting.
    pub refuse_connects: usize,
}

#[allow(dead_code)]
impl ScriptedNetwork {
    pub fn starts(&self) -> usize {
        self.calls.iter().filter(|c| **c == NetCall::Start).count()
    }

    pub fn connects(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, NetCall::Connect(_))).count()
    }

    pub fn last_connect(&self) -> Option<Duration> {
        self.calls.iter().rev().find_map(|c| match c {
            NetCall::Connect(d) => Some(*d),
            NetCall::Start => None,
        })
    }
}

impl NetworkPort for ScriptedNetwork {
    fn start(&mut self) -> Result<(), NetworkError> {
        if self.fail_start {
            return Err(NetworkError::Driver(-1));
        }
        self.calls.push(NetCall::Start);
        Ok(())
    }

    fn connect(&mut self, after: Duration) -> Result<(), NetworkError> {
        self.calls.push(NetCall::Connect(after));
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            return Err(NetworkError::TimerUnavailable);
        }
        Ok(())
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub qos: Qos,
    pub retain: bool,
}

#[derive(Default)]
struct BrokerState {
    handler: Option<SessionHandler>,
    published: Vec<Published>,
    opens: u32,
}

/// Test-side view of a [`MockTransport`]: inject session events and
/// inspect what was published.
#[derive(Clone, Default)]
pub struct BrokerHandle(Arc<Mutex<BrokerState>>);

#[allow(dead_code)]
impl BrokerHandle {
    pub fn emit(&self, event: SessionEvent) {
        let mut state = self.0.lock().unwrap();
        if let Some(handler) = state.handler.as_mut() {
            handler(event);
        }
    }

    pub fn published(&self) -> Vec<Published> {
        self.0.lock().unwrap().published.clone()
    }

    pub fn opens(&self) -> u32 {
        self.0.lock().unwrap().opens
    }
}

pub struct MockTransport {
    broker: BrokerHandle,
    connect_on_open: bool,
    fail_open: bool,
}

#[allow(dead_code)]
impl MockTransport {
    /// Transport whose session connects only when the test says so.
    pub fn new() -> (Self, BrokerHandle) {
        let broker = BrokerHandle::default();
        let transport = Self {
            broker: broker.clone(),
            connect_on_open: false,
            fail_open: false,
        };
        (transport, broker)
    }

    /// Transport that reports `Connected` from inside `open`.
    pub fn connected() -> (Self, BrokerHandle) {
        let (mut t, b) = Self::new();
        t.connect_on_open = true;
        (t, b)
    }

    pub fn failing() -> (Self, BrokerHandle) {
        let (mut t, b) = Self::new();
        t.fail_open = true;
        (t, b)
    }
}

impl TransportPort for MockTransport {
    fn open(
        &mut self,
        _endpoint: &Endpoint<'_>,
        _trust_anchor: TrustAnchor,
        mut handler: SessionHandler,
    ) -> Result<(), TransportError> {
        let mut state = self.broker.0.lock().unwrap();
        state.opens += 1;
        if self.fail_open {
            return Err(TransportError::Open(-1));
        }
        if self.connect_on_open {
            handler(SessionEvent::BeforeConnect);
            handler(SessionEvent::Connected);
        }
        state.handler = Some(handler);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> Result<u32, TransportError> {
        let mut state = self.broker.0.lock().unwrap();
        state.published.push(Published {
            topic: topic.to_owned(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            qos,
            retain,
        });
        Ok(state.published.len() as u32)
    }
}

// ── Time ──────────────────────────────────────────────────────

/// Simulated microsecond clock shared by the delay, the clock and the
/// sensors (which may burn time to model slow reads).
#[derive(Clone, Default)]
pub struct SimTime(Rc<Cell<u64>>);

impl SimTime {
    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, us: u64) {
        self.0.set(self.0.get() + us);
    }
}

pub struct SimDelay {
    pub time: SimTime,
    pub slept_us: Vec<u64>,
}

#[allow(dead_code)]
impl SimDelay {
    pub fn new(time: &SimTime) -> Self {
        Self {
            time: time.clone(),
            slept_us: Vec::new(),
        }
    }

    pub fn total_slept_us(&self) -> u64 {
        self.slept_us.iter().sum()
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        let us = u64::from(ns) / 1_000;
        self.time.advance(us);
        self.slept_us.push(us);
    }

    fn delay_us(&mut self, us: u32) {
        self.time.advance(u64::from(us));
        self.slept_us.push(u64::from(us));
    }

    fn delay_ms(&mut self, ms: u32) {
        let us = u64::from(ms) * 1_000;
        self.time.advance(us);
        self.slept_us.push(us);
    }
}

pub struct SimClock(pub SimTime);

impl MonotonicClock for SimClock {
    fn now_us(&self) -> u64 {
        self.0.now()
    }
}

// ── Sensors ───────────────────────────────────────────────────

/// Replays scripted results; repeats the last one once exhausted.
pub struct ScriptedClimate {
    script: VecDeque<Result<ClimateReading, SensorError>>,
    last: Result<ClimateReading, SensorError>,
    time: Option<(SimTime, u64)>,
}

#[allow(dead_code)]
impl ScriptedClimate {
    pub fn steady(temperature_c: f32, humidity_pct: f32) -> Self {
        Self::script([Ok(ClimateReading {
            temperature_c,
            humidity_pct,
        })])
    }

    pub fn script(results: impl IntoIterator<Item = Result<ClimateReading, SensorError>>) -> Self {
        let script: VecDeque<_> = results.into_iter().collect();
        let last = script.back().copied().unwrap_or(Err(SensorError::Timeout));
        Self {
            script,
            last,
            time: None,
        }
    }

    /// Each read takes `us` of simulated time.
    pub fn taking(mut self, time: &SimTime, us: u64) -> Self {
        self.time = Some((time.clone(), us));
        self
    }
}

impl ClimateSensor for ScriptedClimate {
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        if let Some((time, us)) = &self.time {
            time.advance(*us);
        }
        self.script.pop_front().unwrap_or(self.last)
    }
}

pub struct ScriptedSoil {
    script: VecDeque<Result<i32, SensorError>>,
    last: Result<i32, SensorError>,
    pub channels: Vec<u8>,
}

#[allow(dead_code)]
impl ScriptedSoil {
    pub fn steady(raw: i32) -> Self {
        Self::script([Ok(raw)])
    }

    pub fn script(results: impl IntoIterator<Item = Result<i32, SensorError>>) -> Self {
        let script: VecDeque<_> = results.into_iter().collect();
        let last = script.back().copied().unwrap_or(Err(SensorError::Timeout));
        Self {
            script,
            last,
            channels: Vec::new(),
        }
    }
}

impl SoilSensor for ScriptedSoil {
    fn read(&mut self, channel: u8) -> Result<i32, SensorError> {
        self.channels.push(channel);
        self.script.pop_front().unwrap_or(self.last)
    }
}
