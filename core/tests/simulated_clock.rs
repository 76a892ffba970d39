//! Simulated clock tests — monotonicity, pause, reset, drift and day boundary.

use chrono::{Duration, NaiveTime, TimeZone, Utc};
use dayclock_core::{
    clock::{DayBoundaryPolicy, DriftPolicy, ManualWallClock, SimSpeed, SimulatedClock, WallClock},
    config::EmulationConfig,
};
use proptest::prelude::*;
use std::sync::Arc;

fn wall() -> Arc<ManualWallClock> {
    Arc::new(ManualWallClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()))
}

fn running_clock(config: &EmulationConfig, wall: &Arc<ManualWallClock>) -> SimulatedClock {
    let mut clock = SimulatedClock::new(config, wall.clone());
    clock.start();
    clock
}

/// 60x: one real second is one emulated minute.
#[test]
fn one_second_is_one_minute_at_demo_speed() {
    let config = EmulationConfig::default_test();
    let wall = wall();
    let mut clock = running_clock(&config, &wall);

    wall.advance_millis(1_000);
    let outcome = clock.tick(wall.now());

    assert_eq!(outcome.advanced, Duration::minutes(1));
    assert_eq!(clock.emulated_time(), config.reference_datetime() + Duration::minutes(1));
}

/// start() is idempotent and does not refresh the wall sample.
#[test]
fn start_twice_keeps_first_sample() {
    let config = EmulationConfig::default_test();
    let wall = wall();
    let mut clock = running_clock(&config, &wall);
    let sample = clock.last_wall_sample();

    wall.advance_millis(2_000);
    assert!(!clock.start());
    assert_eq!(clock.last_wall_sample(), sample);
}

/// Pausing twice freezes time exactly where pausing once does.
#[test]
fn pause_is_idempotent() {
    let config = EmulationConfig::default_test();
    let wall = wall();
    let mut clock = running_clock(&config, &wall);

    wall.advance_millis(3_000);
    clock.tick(wall.now());

    assert!(clock.pause());
    let frozen = clock.emulated_time();
    assert!(!clock.pause());
    assert_eq!(clock.emulated_time(), frozen);

    wall.advance_millis(10_000);
    clock.tick(wall.now());
    assert_eq!(clock.emulated_time(), frozen, "paused clock must not advance");
}

/// Time spent paused is not replayed on resume.
#[test]
fn resume_does_not_replay_paused_time() {
    let config = EmulationConfig::default_test();
    let wall = wall();
    let mut clock = running_clock(&config, &wall);

    clock.pause();
    wall.advance_millis(60_000);
    clock.start();
    wall.advance_millis(1_000);
    clock.tick(wall.now());

    assert_eq!(clock.emulated_time(), config.reference_datetime() + Duration::minutes(1));
}

/// reset() lands on the reference start regardless of prior state,
/// and leaves the running flag alone.
#[test]
fn reset_returns_to_reference() {
    let config = EmulationConfig::default_test();
    let wall = wall();
    let mut clock = running_clock(&config, &wall);

    for _ in 0..17 {
        wall.advance_millis(1_337);
        clock.tick(wall.now());
    }
    clock.reset();
    assert_eq!(clock.emulated_time(), config.reference_datetime());
    assert!(clock.is_running());

    clock.pause();
    clock.reset();
    assert_eq!(clock.emulated_time(), config.reference_datetime());
    assert!(!clock.is_running());
}

/// The default drift policy caps a long gap (backgrounded process).
#[test]
fn drift_cap_limits_large_delta() {
    let config = EmulationConfig {
        drift_policy: DriftPolicy::Cap { max_delta_ms: 5_000 },
        ..EmulationConfig::default_test()
    };
    let wall = wall();
    let mut clock = running_clock(&config, &wall);

    wall.advance_millis(10 * 60_000);
    let outcome = clock.tick(wall.now());

    assert!(outcome.delta_capped);
    assert_eq!(outcome.advanced, Duration::minutes(5));
}

/// Fast-forward applies the whole gap.
#[test]
fn fast_forward_applies_full_delta() {
    let config = EmulationConfig::default_test();
    let wall = wall();
    let mut clock = running_clock(&config, &wall);

    wall.advance_millis(10 * 60_000);
    let outcome = clock.tick(wall.now());

    assert!(!outcome.delta_capped);
    assert_eq!(outcome.advanced, Duration::minutes(600));
}

/// A wall clock that jumps backwards holds emulated time still.
#[test]
fn backwards_wall_clock_holds_time() {
    let config = EmulationConfig::default_test();
    let wall = wall();
    let mut clock = running_clock(&config, &wall);

    wall.advance_millis(5_000);
    clock.tick(wall.now());
    let before = clock.emulated_time();

    wall.advance_millis(-3_000);
    let outcome = clock.tick(wall.now());
    assert_eq!(outcome.advanced, Duration::zero());
    assert_eq!(clock.emulated_time(), before);

    // Progress resumes from the new (earlier) sample.
    wall.advance_millis(1_000);
    clock.tick(wall.now());
    assert_eq!(clock.emulated_time(), before + Duration::minutes(1));
}

/// Rollover carries on into the next emulated date.
#[test]
fn rollover_crosses_midnight() {
    let config = EmulationConfig {
        reference_start: NaiveTime::from_hms_opt(23, 58, 0).unwrap(),
        ..EmulationConfig::default_test()
    };
    let wall = wall();
    let mut clock = running_clock(&config, &wall);

    wall.advance_millis(5_000);
    let outcome = clock.tick(wall.now());

    assert_eq!(outcome.days_rolled, 1);
    assert_eq!(clock.emulated_time().date(), config.reference_date.succ_opt().unwrap());
    assert_eq!(clock.emulated_time().time(), NaiveTime::from_hms_opt(0, 3, 0).unwrap());
}

/// Clamp stops at the last millisecond of the day and pauses.
#[test]
fn clamp_stops_at_end_of_day() {
    let config = EmulationConfig {
        reference_start: NaiveTime::from_hms_opt(23, 58, 0).unwrap(),
        day_boundary: DayBoundaryPolicy::Clamp,
        ..EmulationConfig::default_test()
    };
    let wall = wall();
    let mut clock = running_clock(&config, &wall);

    wall.advance_millis(5_000);
    let outcome = clock.tick(wall.now());

    assert!(outcome.clamped);
    assert!(!clock.is_running());
    assert_eq!(clock.emulated_time().date(), config.reference_date);
    assert_eq!(
        clock.emulated_time().time(),
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()
    );
}

/// Speed changes take effect on the next tick.
#[test]
fn set_speed_changes_rate() {
    let config = EmulationConfig::default_test();
    let wall = wall();
    let mut clock = running_clock(&config, &wall);

    assert!(clock.set_speed(SimSpeed::Rapid));
    assert!(!clock.set_speed(SimSpeed::Rapid));
    wall.advance_millis(1_000);
    clock.tick(wall.now());

    assert_eq!(clock.emulated_time(), config.reference_datetime() + Duration::minutes(10));
}

proptest! {
    /// Non-decreasing wall samples never move emulated time backwards.
    #[test]
    fn emulated_time_is_monotonic(
        deltas in prop::collection::vec(0i64..20_000, 1..100),
        factor in 0.5f64..900.0,
        capped in any::<bool>(),
    ) {
        let config = EmulationConfig {
            acceleration_factor: factor,
            drift_policy: if capped {
                DriftPolicy::Cap { max_delta_ms: 5_000 }
            } else {
                DriftPolicy::FastForward
            },
            ..EmulationConfig::default_test()
        };
        let wall = wall();
        let mut clock = running_clock(&config, &wall);

        let mut last = clock.emulated_time();
        for d in deltas {
            wall.advance_millis(d);
            clock.tick(wall.now());
            prop_assert!(clock.emulated_time() >= last);
            last = clock.emulated_time();
        }
    }
}
