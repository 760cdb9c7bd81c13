//! Integration tests for the startup sequence: link supervision,
//! readiness, session start and first publish.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use plantnode::adapters::wifi::{SIM_ADDRESS, WifiStation};
use plantnode::app::events::{LinkEvent, SessionEvent};
use plantnode::app::ports::Qos;
use plantnode::config::{AgentConfig, DEFAULT_TOPIC};
use plantnode::error::{CommsError, Error};
use plantnode::link::{LinkState, Supervisor};
use plantnode::readiness::ReadinessSignal;
use plantnode::retry::{Backoff, RetryPolicy};
use plantnode::sampling::{CycleOutcome, SamplingLoop};
use plantnode::telemetry::{Publisher, SessionState, SubmitOutcome};

use crate::mock_hw::{
    MockTransport, NetCall, ScriptedClimate, ScriptedNetwork, ScriptedSoil, SimClock, SimDelay, SimTime,
    endpoint, trust_anchor,
};

fn config() -> AgentConfig {
    AgentConfig::from_lookup(|key| match key {
        "PLANTNODE_WIFI_SSID" => Some("Greenhouse"),
        "PLANTNODE_WIFI_PASS" => Some("hunter22"),
        "PLANTNODE_BROKER_URL" => Some("mqtts://collector.example.net:8883"),
        _ => None,
    })
    .unwrap()
}

fn midpoint() -> u32 {
    // offset = span: lands exactly on the base delay.
    200
}

fn supervisor(policy: RetryPolicy) -> Supervisor<ScriptedNetwork> {
    Supervisor::with_backoff(
        ScriptedNetwork::default(),
        Arc::new(ReadinessSignal::new()),
        Backoff::with_entropy(policy, midpoint),
    )
}

// ── Full host simulation ─────────────────────────────────────

#[test]
fn sim_station_reaches_ready_and_first_sample_is_published() {
    let cfg = config();
    cfg.validate().unwrap();

    let readiness = Arc::new(ReadinessSignal::new());
    let (station, events) = WifiStation::new(&cfg.network);
    let station = station.with_latency(Duration::from_millis(10));
    let sup = Arc::new(Mutex::new(Supervisor::new(station, Arc::clone(&readiness), cfg.link_retry)));

    let forward = Arc::clone(&sup);
    thread::spawn(move || {
        for event in events {
            forward.lock().unwrap().on_event(event);
        }
    });

    sup.lock().unwrap().start().unwrap();
    readiness.wait(Some(Duration::from_secs(5))).unwrap();

    {
        let s = sup.lock().unwrap();
        assert_eq!(s.state(), LinkState::Up);
        assert_eq!(s.address(), Some(SIM_ADDRESS));
        assert_eq!(s.network().connect_attempts(), 1);
    }

    let (transport, broker) = MockTransport::connected();
    let mut publisher = Publisher::new(transport);
    publisher.start(&endpoint(), trust_anchor()).unwrap();
    assert_eq!(publisher.state(), SessionState::Connected);

    let time = SimTime::default();
    let mut sampler = SamplingLoop::new(
        &cfg,
        ScriptedClimate::steady(21.54, 48.16),
        ScriptedSoil::steady(1820),
        publisher,
        SimDelay::new(&time),
        SimClock(time.clone()),
    );

    assert_eq!(sampler.step(), CycleOutcome::Submitted(SubmitOutcome::Enqueued(1)));

    let published = broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, DEFAULT_TOPIC);
    assert_eq!(published[0].payload, r#"{"temp": 21.5, "humidity": 48.2, "soil_raw": 1820}"#);
    assert_eq!(published[0].qos, Qos::AtLeastOnce);
    assert!(!published[0].retain);
    assert_eq!(sampler.delay().total_slept_us(), 10_000_000);
}

// ── Supervisor scenarios ─────────────────────────────────────

#[test]
fn link_loss_clears_readiness_and_schedules_backoff() {
    let mut sup = supervisor(RetryPolicy::default());
    let ready = sup.readiness();

    assert_eq!(sup.state(), LinkState::Down);
    sup.start().unwrap();
    assert_eq!(sup.state(), LinkState::Down);

    sup.on_event(LinkEvent::InterfaceStarted);
    assert_eq!(sup.state(), LinkState::Connecting);
    assert_eq!(sup.network().last_connect(), Some(Duration::ZERO));
    assert!(!ready.is_set());

    sup.on_event(LinkEvent::AddressAcquired(SIM_ADDRESS));
    assert_eq!(sup.state(), LinkState::Up);
    assert!(ready.is_set());

    sup.on_event(LinkEvent::Disconnected { reason: 8 });
    assert_eq!(sup.state(), LinkState::Connecting);
    assert!(!ready.is_set());
    assert_eq!(sup.address(), None);
    assert_eq!(sup.network().last_connect(), Some(Duration::from_millis(1_000)));

    sup.on_event(LinkEvent::AddressAcquired(SIM_ADDRESS));
    assert!(ready.is_set());
    assert_eq!(sup.retry_attempts(), 0);
}

#[test]
fn start_twice_issues_a_single_driver_start() {
    let mut sup = supervisor(RetryPolicy::default());
    sup.start().unwrap();
    sup.start().unwrap();
    sup.on_event(LinkEvent::InterfaceStarted);
    sup.start().unwrap();

    assert_eq!(sup.network().starts(), 1);
    assert_eq!(
        sup.network().calls,
        [NetCall::Start, NetCall::Connect(Duration::ZERO)]
    );
}

#[test]
fn repeated_failures_back_off_exponentially_then_give_up() {
    let policy = RetryPolicy {
        max_attempts: Some(3),
        jitter_pct: 0,
        ..RetryPolicy::default()
    };
    let mut sup = supervisor(policy);
    sup.start().unwrap();
    sup.on_event(LinkEvent::InterfaceStarted);

    for expected_ms in [1_000, 2_000, 4_000] {
        sup.on_event(LinkEvent::Disconnected { reason: 201 });
        assert_eq!(sup.state(), LinkState::Connecting);
        assert_eq!(sup.network().last_connect(), Some(Duration::from_millis(expected_ms)));
    }

    sup.on_event(LinkEvent::Disconnected { reason: 201 });
    assert_eq!(sup.state(), LinkState::Down);
    let calls_after_giving_up = sup.network().calls.len();

    sup.on_event(LinkEvent::Disconnected { reason: 201 });
    assert_eq!(sup.network().calls.len(), calls_after_giving_up);

    // An explicit start revives the link immediately.
    sup.start().unwrap();
    assert_eq!(sup.state(), LinkState::Connecting);
    assert_eq!(sup.network().last_connect(), Some(Duration::ZERO));
}

#[test]
fn refused_first_connect_does_not_strand_the_link() {
    let mut sup = Supervisor::with_backoff(
        ScriptedNetwork {
            refuse_connects: 1,
            ..ScriptedNetwork::default()
        },
        Arc::new(ReadinessSignal::new()),
        Backoff::with_entropy(RetryPolicy::default(), midpoint),
    );
    let ready = sup.readiness();

    sup.start().unwrap();
    sup.on_event(LinkEvent::InterfaceStarted);
    sup.on_event(LinkEvent::InterfaceStarted);
    sup.start().unwrap();

    assert!(sup.network().connects() > 1);
    assert_eq!(sup.network().last_connect(), Some(Duration::from_millis(1_000)));
    assert_eq!(sup.state(), LinkState::Connecting);

    sup.on_event(LinkEvent::AddressAcquired(SIM_ADDRESS));
    assert!(ready.is_set());
}

#[test]
fn disconnect_before_interface_start_does_not_block_connecting() {
    let mut sup = supervisor(RetryPolicy::default());
    sup.start().unwrap();
    sup.on_event(LinkEvent::Disconnected { reason: 205 });
    assert_eq!(sup.state(), LinkState::Down);

    sup.on_event(LinkEvent::InterfaceStarted);
    assert_eq!(sup.state(), LinkState::Connecting);
    assert_eq!(sup.network().last_connect(), Some(Duration::ZERO));
}

#[test]
fn driver_start_failure_is_reported_and_state_stays_down() {
    let mut sup = Supervisor::new(
        ScriptedNetwork {
            fail_start: true,
            ..ScriptedNetwork::default()
        },
        Arc::new(ReadinessSignal::new()),
        RetryPolicy::default(),
    );
    assert!(sup.start().is_err());
    assert_eq!(sup.state(), LinkState::Down);
}

#[test]
fn readiness_wait_times_out_without_a_link() {
    let sup = supervisor(RetryPolicy::default());
    assert_eq!(
        sup.await_ready(Some(Duration::from_millis(50))),
        Err(Error::Comms(CommsError::ReadyTimeout))
    );
}

#[test]
fn waiter_on_another_thread_is_released_by_address_event() {
    let mut sup = supervisor(RetryPolicy::default());
    let ready = sup.readiness();
    let waiter = thread::spawn(move || ready.wait(Some(Duration::from_secs(5))));

    sup.start().unwrap();
    sup.on_event(LinkEvent::InterfaceStarted);
    thread::sleep(Duration::from_millis(20));
    sup.on_event(LinkEvent::AddressAcquired(SIM_ADDRESS));

    assert_eq!(waiter.join().unwrap(), Ok(()));
}

// ── Publisher scenarios ──────────────────────────────────────

#[test]
fn submit_follows_session_state() {
    let (transport, broker) = MockTransport::new();
    let mut publisher = Publisher::new(transport);

    // Not started at all.
    assert_eq!(
        publisher.submit(DEFAULT_TOPIC, b"{}", Qos::AtLeastOnce, false),
        SubmitOutcome::Dropped
    );

    publisher.start(&endpoint(), trust_anchor()).unwrap();
    assert_eq!(publisher.state(), SessionState::Starting);
    assert_eq!(
        publisher.submit(DEFAULT_TOPIC, b"{}", Qos::AtLeastOnce, false),
        SubmitOutcome::Dropped
    );

    broker.emit(SessionEvent::Connected);
    assert_eq!(
        publisher.submit(DEFAULT_TOPIC, b"{}", Qos::AtLeastOnce, false),
        SubmitOutcome::Enqueued(1)
    );

    broker.emit(SessionEvent::Disconnected);
    assert_eq!(publisher.state(), SessionState::Disconnected);
    assert_eq!(
        publisher.submit(DEFAULT_TOPIC, b"{}", Qos::AtLeastOnce, false),
        SubmitOutcome::Dropped
    );

    // Nothing buffered while disconnected is replayed on reconnect.
    broker.emit(SessionEvent::Connected);
    assert_eq!(broker.published().len(), 1);

    let stats = publisher.stats();
    assert_eq!((stats.enqueued, stats.dropped, stats.failed), (1, 3, 0));
}

#[test]
fn session_start_is_idempotent() {
    let (transport, broker) = MockTransport::connected();
    let mut publisher = Publisher::new(transport);
    publisher.start(&endpoint(), trust_anchor()).unwrap();
    publisher.start(&endpoint(), trust_anchor()).unwrap();
    assert_eq!(broker.opens(), 1);
}

#[test]
fn failed_session_start_can_be_retried() {
    let (transport, broker) = MockTransport::failing();
    let mut publisher = Publisher::new(transport);

    assert_eq!(
        publisher.start(&endpoint(), trust_anchor()),
        Err(Error::Comms(CommsError::SessionStartFailed))
    );
    assert_eq!(publisher.state(), SessionState::Uninitialized);

    assert!(publisher.start(&endpoint(), trust_anchor()).is_err());
    assert_eq!(broker.opens(), 2);
}
