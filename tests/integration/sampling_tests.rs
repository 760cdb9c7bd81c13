//! Sampling loop against scripted sensors, a mock broker and simulated time.

use plantnode::app::events::SessionEvent;
use plantnode::app::ports::ClimateReading;
use plantnode::config::{AgentConfig, Cadence};
use plantnode::error::{ESP_ERR_INVALID_RESPONSE, ESP_ERR_TIMEOUT, SensorError};
use plantnode::sampling::{CycleOutcome, SamplingLoop};
use plantnode::telemetry::{Publisher, SubmitOutcome};

use crate::mock_hw::{
    BrokerHandle, MockTransport, ScriptedClimate, ScriptedSoil, SimClock, SimDelay, SimTime, endpoint,
    trust_anchor,
};

type Loop = SamplingLoop<ScriptedClimate, ScriptedSoil, MockTransport, SimDelay, SimClock>;

fn build(cadence: Cadence, climate: ScriptedClimate, soil: ScriptedSoil, time: &SimTime) -> (Loop, BrokerHandle) {
    let mut cfg = AgentConfig::default();
    cfg.sampling.cadence = cadence;

    let (transport, broker) = MockTransport::connected();
    let mut publisher = Publisher::new(transport);
    publisher.start(&endpoint(), trust_anchor()).unwrap();

    let sampler = SamplingLoop::new(&cfg, climate, soil, publisher, SimDelay::new(time), SimClock(time.clone()));
    (sampler, broker)
}

fn reading(t: f32, h: f32) -> Result<ClimateReading, SensorError> {
    Ok(ClimateReading {
        temperature_c: t,
        humidity_pct: h,
    })
}

#[test]
fn every_cycle_publishes_current_readings() {
    let time = SimTime::default();
    let (mut sampler, broker) = build(
        Cadence::AfterWork,
        ScriptedClimate::script([reading(20.0, 50.0), reading(20.5, 51.0), reading(-3.25, 99.96)]),
        ScriptedSoil::script([Ok(0), Ok(2048), Ok(4095)]),
        &time,
    );

    for _ in 0..3 {
        assert!(matches!(sampler.step(), CycleOutcome::Submitted(SubmitOutcome::Enqueued(_))));
    }

    let payloads: Vec<_> = broker.published().into_iter().map(|p| p.payload).collect();
    assert_eq!(
        payloads,
        [
            r#"{"temp": 20.0, "humidity": 50.0, "soil_raw": 0}"#,
            r#"{"temp": 20.5, "humidity": 51.0, "soil_raw": 2048}"#,
            r#"{"temp": -3.2, "humidity": 100.0, "soil_raw": 4095}"#,
        ]
    );
    assert_eq!(sampler.stats().published, 3);
}

#[test]
fn climate_timeout_skips_the_cycle_and_loop_continues() {
    let time = SimTime::default();
    let (mut sampler, broker) = build(
        Cadence::AfterWork,
        ScriptedClimate::script([Err(SensorError::Timeout), reading(21.0, 45.0)]),
        ScriptedSoil::steady(1800),
        &time,
    );

    assert_eq!(
        sampler.step(),
        CycleOutcome::Skipped {
            climate: ESP_ERR_TIMEOUT,
            soil: 0
        }
    );
    assert!(broker.published().is_empty());

    assert!(matches!(sampler.step(), CycleOutcome::Submitted(_)));
    assert_eq!(broker.published().len(), 1);

    let stats = sampler.stats();
    assert_eq!((stats.cycles, stats.published, stats.skipped), (2, 1, 1));
    // Skipped cycles still sleep a full period.
    assert_eq!(time.now(), 20_000_000);
}

#[test]
fn implausible_readings_are_rejected() {
    let time = SimTime::default();
    let (mut sampler, broker) = build(
        Cadence::AfterWork,
        ScriptedClimate::script([reading(85.0, 50.0), reading(20.0, 50.0)]),
        ScriptedSoil::script([Ok(1000), Ok(5000)]),
        &time,
    );

    assert_eq!(
        sampler.run_cycle(),
        CycleOutcome::Skipped {
            climate: ESP_ERR_INVALID_RESPONSE,
            soil: 0
        }
    );
    assert_eq!(
        sampler.run_cycle(),
        CycleOutcome::Skipped {
            climate: 0,
            soil: ESP_ERR_INVALID_RESPONSE
        }
    );
    assert!(broker.published().is_empty());
}

#[test]
fn readings_while_session_is_down_are_dropped_not_queued() {
    let time = SimTime::default();
    let (mut sampler, broker) = build(
        Cadence::AfterWork,
        ScriptedClimate::steady(19.0, 60.0),
        ScriptedSoil::steady(2100),
        &time,
    );

    broker.emit(SessionEvent::Disconnected);
    assert_eq!(sampler.step(), CycleOutcome::Submitted(SubmitOutcome::Dropped));
    assert_eq!(sampler.step(), CycleOutcome::Submitted(SubmitOutcome::Dropped));

    broker.emit(SessionEvent::Connected);
    assert!(matches!(sampler.step(), CycleOutcome::Submitted(SubmitOutcome::Enqueued(_))));

    assert_eq!(broker.published().len(), 1);
    assert_eq!(sampler.stats().dropped, 2);
    assert_eq!(sampler.publisher().stats().dropped, 2);
}

#[test]
fn after_work_cadence_adds_cycle_time_to_the_period() {
    let time = SimTime::default();
    let (mut sampler, _broker) = build(
        Cadence::AfterWork,
        ScriptedClimate::steady(20.0, 50.0).taking(&time, 300_000),
        ScriptedSoil::steady(1200),
        &time,
    );

    for _ in 0..3 {
        sampler.step();
    }
    assert_eq!(time.now(), 3 * 10_300_000);
}

#[test]
fn fixed_rate_cadence_holds_the_period() {
    let time = SimTime::default();
    let (mut sampler, _broker) = build(
        Cadence::FixedRate,
        ScriptedClimate::steady(20.0, 50.0).taking(&time, 300_000),
        ScriptedSoil::steady(1200),
        &time,
    );

    for _ in 0..3 {
        sampler.step();
    }
    assert_eq!(time.now(), 30_000_000);
    assert!(sampler.delay().slept_us.iter().all(|&us| us < 10_000_000));
}

#[test]
fn fixed_rate_overrun_starts_next_cycle_immediately() {
    let time = SimTime::default();
    let (mut sampler, _broker) = build(
        Cadence::FixedRate,
        ScriptedClimate::steady(20.0, 50.0).taking(&time, 12_000_000),
        ScriptedSoil::steady(1200),
        &time,
    );

    sampler.step();
    assert!(sampler.delay().slept_us.is_empty());
    assert_eq!(time.now(), 12_000_000);
}
