//! Metrics derivation tests — non-negativity, continuity, step transitions.

use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use dayclock_core::{
    clock::{ManualWallClock, WallClock},
    config::{EmulationConfig, JitterConfig},
    metrics::MetricsModel,
    phase::{Metric, Transition},
    rng::{JitterBank, JitterRng},
    BusinessDayEmulator,
};
use proptest::prelude::*;
use std::sync::Arc;

fn model() -> MetricsModel {
    MetricsModel::from_config(&EmulationConfig::default()).expect("default config is valid")
}

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(12, 0, 0).unwrap()
}

/// At the end of phase N and the start of phase N+1 (same seed) the
/// bundle is the same, unless N+1 is a step transition.
#[test]
fn metrics_continuous_across_blend_boundaries() {
    let m = model();
    let phases = m.table().get_phases();

    for n in 0..phases.len() - 1 {
        if phases[n + 1].transition == Transition::Step {
            continue;
        }
        let end = m.derive_at(n, 100.0, noon(), None, &mut JitterRng::seeded(11));
        let start = m.derive_at(n + 1, 0.0, noon(), None, &mut JitterRng::seeded(11));

        let pairs = [
            ("tpm", end.transactions_per_minute, start.transactions_per_minute),
            ("total", end.total_transactions as f64, start.total_transactions as f64),
            ("avg", end.average_transaction_value, start.average_transaction_value),
            ("queued", end.queued_payments as f64, start.queued_payments as f64),
            ("util", end.liquidity_utilization_percent, start.liquidity_utilization_percent),
            ("avail", end.available_liquidity, start.available_liquidity),
        ];
        for (field, a, b) in pairs {
            let tolerance = 1e-6 * a.abs().max(1.0) + 1.0;
            assert!(
                (a - b).abs() <= tolerance,
                "{field} jumps from {a} to {b} between '{}' and '{}'",
                phases[n].name,
                phases[n + 1].name
            );
        }
    }
}

/// The last phase flows back into the first one at midnight.
#[test]
fn rate_continuous_across_midnight() {
    let m = model();
    let last = m.table().last_index();
    for metric in Metric::ALL {
        let end = m.level(last, metric, 100.0);
        let start = m.level(0, metric, 0.0);
        assert!((end - start).abs() < 1e-9, "{metric:?}: {end} vs {start}");
    }
}

/// Start-of-Day opens with the queue near zero.
#[test]
fn queue_resets_at_day_open() {
    let m = model();
    let sod = m.table().index_of("Start-of-Day").unwrap();

    let before = m.level(sod - 1, Metric::QueueDepth, 100.0);
    let after = m.level(sod, Metric::QueueDepth, 0.0);
    assert!(after < before, "queue should drop at day open: {before} -> {after}");
    assert!(after <= 0.05 * m.base_value(sod, Metric::QueueDepth) + 1e-9);
}

/// Nothing settles once the system closes for maintenance.
#[test]
fn maintenance_window_opens_closed() {
    let m = model();
    let maint = m.table().index_of("Maintenance Window").unwrap();
    assert_eq!(m.table().get_phases()[maint].transition, Transition::Step);

    assert_eq!(m.level(maint, Metric::Throughput, 0.0), 0.0);
    assert_eq!(m.level(maint, Metric::Throughput, 50.0), 0.0);
    let bundle = m.derive_at(maint, 10.0, noon(), None, &mut JitterRng::seeded(3));
    assert_eq!(bundle.transactions_per_minute, 0.0);
    assert_eq!(bundle.queued_payments, 0);
}

/// Throughput peaks in the middle of Peak Trading, well above pre-opening.
#[test]
fn peak_trading_busier_than_pre_opening() {
    let m = model();
    let pre = m.table().index_of("Pre-Opening").unwrap();
    let peak = m.table().index_of("Peak Trading").unwrap();
    assert!(m.level(peak, Metric::Throughput, 50.0) > 3.0 * m.level(pre, Metric::Throughput, 50.0));
}

/// With jitter off, total transactions never decrease through the day.
#[test]
fn total_transactions_accumulate_through_day() {
    let m = MetricsModel::new(m_table(), JitterConfig::none(), 1000.0);
    let mut last = 0.0;
    for i in 0..m.table().len() {
        for step in 0..=20 {
            let total = m.cumulative_throughput(i, f64::from(step) * 5.0);
            assert!(total + 1e-9 >= last, "total fell from {last} to {total} in phase {i}");
            last = total;
        }
    }
    assert!(last > 100_000.0, "a full day should settle a lot of payments, got {last}");
}

/// With jitter on, running totals still only grow between ticks of one day.
#[test]
fn jittered_totals_never_fall_within_a_day() {
    let wall = Arc::new(ManualWallClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()));
    let mut emulator =
        BusinessDayEmulator::with_seed(EmulationConfig::default_test(), wall.clone(), 7).expect("build emulator");
    emulator.start();

    let mut last = emulator.metrics().clone();
    for step in 0..400 {
        wall.advance_millis(1_000);
        emulator.tick(wall.now());
        let now = emulator.metrics();
        assert!(
            now.total_transactions >= last.total_transactions,
            "step {step}: total fell from {} to {} at {}",
            last.total_transactions,
            now.total_transactions,
            now.emulated_time
        );
        assert!(
            now.settlement_value >= last.settlement_value,
            "step {step}: settled value fell from {} to {}",
            last.settlement_value,
            now.settlement_value
        );
        last = now.clone();
    }
    assert!(last.total_transactions > 0);
}

fn m_table() -> dayclock_core::PhaseTable {
    dayclock_core::PhaseTable::standard()
}

/// Smoothed jitter never leaves the configured band.
#[test]
fn smoothed_jitter_stays_in_band() {
    let m = model();
    let mut rng = JitterBank::new(5);
    let mut prev = None;
    let mut t = noon();
    for step in 0..500 {
        let bundle = m.derive_at(3, f64::from(step % 100), t, prev.as_ref(), &mut rng);
        for f in [
            bundle.jitter.throughput,
            bundle.jitter.average_value,
            bundle.jitter.queue_depth,
            bundle.jitter.liquidity_usage,
        ] {
            assert!((0.9..=1.1).contains(&f), "factor {f} outside [0.9, 1.1]");
        }
        prev = Some(bundle);
        t += Duration::seconds(1);
    }
}

/// Same seed, same bundle.
#[test]
fn seeded_derivation_is_reproducible() {
    let m = model();
    let a = m.derive_at(4, 37.5, noon(), None, &mut JitterBank::new(2024));
    let b = m.derive_at(4, 37.5, noon(), None, &mut JitterBank::new(2024));
    assert_eq!(a, b);
}

proptest! {
    /// No field is ever negative, for any phase, progress and seed.
    #[test]
    fn metrics_never_negative(
        phase in 0usize..8,
        progress in 0.0f64..=100.0,
        seed in any::<u64>(),
    ) {
        let m = model();
        let b = m.derive_at(phase, progress, noon(), None, &mut JitterRng::seeded(seed));
        prop_assert!(b.transactions_per_minute >= 0.0);
        prop_assert!(b.average_transaction_value >= 0.0);
        prop_assert!(b.settlement_value >= 0.0);
        prop_assert!(b.available_liquidity >= 0.0);
        prop_assert!((0.0..=100.0).contains(&b.liquidity_utilization_percent));
        prop_assert!((0.0..=100.0).contains(&b.settlement_rate_percent));
        prop_assert!((0.0..=100.0).contains(&b.progress_percent));
    }
}
