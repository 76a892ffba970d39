//! Phase-weighted metrics derivation.
//!
//! Each metric family follows a curve over its phase: the phase's base
//! value sits at 50% progress, and each half eases (cosine ramp) from an
//! edge value to the base or from the base to an edge. Edges are shared
//! with the neighbouring phase, so values are continuous across every
//! `Blend` boundary. A `Step` phase opens at `step_floor * base` instead.
//!
//! The result is multiplied by a bounded, optionally smoothed random
//! factor drawn from an injected `JitterSource`.

use crate::{
    config::{EmulationConfig, JitterConfig},
    error::EmulationResult,
    phase::{Metric, PhaseTable, Transition},
    resolver::PhaseResolution,
    rng::JitterSource,
    types::PhaseName,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Random factors applied to each metric family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct JitterFactors {
    pub throughput:      f64,
    pub average_value:   f64,
    pub queue_depth:     f64,
    pub liquidity_usage: f64,
}

impl JitterFactors {
    pub const NEUTRAL: JitterFactors = JitterFactors {
        throughput:      1.0,
        average_value:   1.0,
        queue_depth:     1.0,
        liquidity_usage: 1.0,
    };

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Throughput     => self.throughput,
            Metric::AverageValue   => self.average_value,
            Metric::QueueDepth     => self.queue_depth,
            Metric::LiquidityUsage => self.liquidity_usage,
        }
    }
}

/// The KPIs dashboards display. Every numeric field is non-negative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsBundle {
    pub emulated_time:                 NaiveDateTime,
    pub phase:                         PhaseName,
    pub phase_index:                   usize,
    pub progress_percent:              f64,
    pub transactions_per_minute:       f64,
    /// Settled since emulated midnight. Never falls within a day.
    pub total_transactions:            u64,
    /// Unrounded `total_transactions`, carried between bundles.
    #[serde(default)]
    pub accrued_transactions:          f64,
    /// Millions.
    pub average_transaction_value:     f64,
    /// Millions settled since emulated midnight: each increment of
    /// transactions valued at the average in force when it settled.
    pub settlement_value:              f64,
    pub queued_payments:               u64,
    pub liquidity_utilization_percent: f64,
    /// Millions.
    pub available_liquidity:           f64,
    pub settlement_rate_percent:       f64,
    pub jitter:                        JitterFactors,
}

/// Edge/base/edge values of one metric over one phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseCurve {
    pub left:  f64,
    pub base:  f64,
    pub right: f64,
}

impl PhaseCurve {
    /// Value at `progress` percent.
    pub fn level(&self, progress: f64) -> f64 {
        let p = progress.clamp(0.0, 100.0);
        if p <= 50.0 {
            self.left + (self.base - self.left) * ease(p / 50.0)
        } else {
            self.base + (self.right - self.base) * ease((p - 50.0) / 50.0)
        }
    }

    /// Integral of the curve from 0 to `progress`, with the phase length as unit.
    pub fn integral(&self, progress: f64) -> f64 {
        let p = progress.clamp(0.0, 100.0);
        if p <= 50.0 {
            let t = p / 50.0;
            0.5 * (self.left * t + (self.base - self.left) * ease_integral(t))
        } else {
            let t = (p - 50.0) / 50.0;
            0.5 * (self.left + self.base) / 2.0
                + 0.5 * (self.base * t + (self.right - self.base) * ease_integral(t))
        }
    }
}

/// Cosine ramp from 0 to 1 over [0, 1].
fn ease(t: f64) -> f64 {
    (1.0 - (PI * t).cos()) / 2.0
}

/// Integral of `ease` over [0, t].
fn ease_integral(t: f64) -> f64 {
    t / 2.0 - (PI * t).sin() / (2.0 * PI)
}

/// The derivation function and the configuration it closes over.
#[derive(Debug, Clone)]
pub struct MetricsModel {
    table:           PhaseTable,
    jitter:          JitterConfig,
    total_liquidity: f64,
}

impl MetricsModel {
    pub fn new(table: PhaseTable, jitter: JitterConfig, total_liquidity: f64) -> Self {
        Self { table, jitter, total_liquidity }
    }

    pub fn from_config(config: &EmulationConfig) -> EmulationResult<Self> {
        let table = config.validate()?;
        Ok(Self::new(table, config.jitter, config.total_liquidity))
    }

    pub fn table(&self) -> &PhaseTable {
        &self.table
    }

    /// Base value of a metric in a phase.
    pub fn base_value(&self, phase_index: usize, metric: Metric) -> f64 {
        self.table.get_phases()[phase_index].profile.get(metric)
    }

    pub fn curve(&self, phase_index: usize, metric: Metric) -> PhaseCurve {
        let phases = self.table.get_phases();
        let phase = &phases[phase_index];
        let prev = &phases[self.table.previous_index(phase_index)];
        let next = &phases[self.table.next_index(phase_index)];
        let base = phase.profile.get(metric);

        let left = match phase.transition {
            Transition::Step  => base * self.jitter.step_floor,
            Transition::Blend => (prev.profile.get(metric) + base) / 2.0,
        };
        let right = match next.transition {
            Transition::Step  => base,
            Transition::Blend => (base + next.profile.get(metric)) / 2.0,
        };
        PhaseCurve { left, base, right }
    }

    /// Base value times the phase's activity curve at `progress`, no jitter.
    pub fn level(&self, phase_index: usize, metric: Metric, progress: f64) -> f64 {
        self.curve(phase_index, metric).level(progress).max(0.0)
    }

    /// Transactions since emulated midnight, no jitter.
    pub fn cumulative_throughput(&self, phase_index: usize, progress: f64) -> f64 {
        let phases = self.table.get_phases();
        let completed: f64 = (0..phase_index)
            .map(|i| f64::from(phases[i].duration()) * self.curve(i, Metric::Throughput).integral(100.0))
            .sum();
        let current = f64::from(phases[phase_index].duration())
            * self.curve(phase_index, Metric::Throughput).integral(progress);
        (completed + current).max(0.0)
    }

    pub fn derive_metrics(
        &self,
        resolution: &PhaseResolution,
        emulated_time: NaiveDateTime,
        previous: Option<&MetricsBundle>,
        rng: &mut dyn JitterSource,
    ) -> MetricsBundle {
        self.derive_at(resolution.phase_index, resolution.progress_percent, emulated_time, previous, rng)
    }

    /// Derive the bundle for an explicit phase and progress.
    pub fn derive_at(
        &self,
        phase_index: usize,
        progress_percent: f64,
        emulated_time: NaiveDateTime,
        previous: Option<&MetricsBundle>,
        rng: &mut dyn JitterSource,
    ) -> MetricsBundle {
        let phase_index = phase_index.min(self.table.last_index());
        let progress = progress_percent.clamp(0.0, 100.0);
        let jitter = self.draw_jitter(previous, rng);

        let tpm = self.level(phase_index, Metric::Throughput, progress) * jitter.throughput;
        let avg = non_negative(self.level(phase_index, Metric::AverageValue, progress) * jitter.average_value);
        let integral = self.cumulative_throughput(phase_index, progress);

        // Within a day only the new slice of the integral is jittered, so the
        // running totals never shrink when the throughput factor drifts.
        let (accrued, settled) = match previous.filter(|p| same_day_not_later(p.emulated_time, emulated_time)) {
            Some(prev) => {
                let phase_index = prev.phase_index.min(self.table.last_index());
                let since = integral - self.cumulative_throughput(phase_index, prev.progress_percent);
                let delta = non_negative(since * jitter.throughput);
                (prev.accrued_transactions + delta, prev.settlement_value + delta * avg)
            }
            None => {
                let total = non_negative(integral * jitter.throughput);
                (total, total * avg)
            }
        };

        let queued = self.level(phase_index, Metric::QueueDepth, progress) * jitter.queue_depth;
        let utilization = (self.level(phase_index, Metric::LiquidityUsage, progress)
            * jitter.liquidity_usage
            * 100.0)
            .clamp(0.0, 100.0);

        let total_transactions = non_negative(accrued).round() as u64;
        let queued_payments = non_negative(queued).round() as u64;
        let tpm = non_negative(tpm);
        let settlement_rate = if tpm + queued_payments as f64 > 0.0 {
            100.0 * tpm / (tpm + queued_payments as f64)
        } else {
            100.0
        };

        MetricsBundle {
            emulated_time,
            phase: self.table.get_phases()[phase_index].name.clone(),
            phase_index,
            progress_percent: progress,
            transactions_per_minute: tpm,
            total_transactions,
            accrued_transactions: non_negative(accrued),
            average_transaction_value: avg,
            settlement_value: non_negative(settled),
            queued_payments,
            liquidity_utilization_percent: utilization,
            available_liquidity: non_negative(self.total_liquidity * (1.0 - utilization / 100.0)),
            settlement_rate_percent: settlement_rate.clamp(0.0, 100.0),
            jitter,
        }
    }

    fn draw_jitter(&self, previous: Option<&MetricsBundle>, rng: &mut dyn JitterSource) -> JitterFactors {
        let mut draw = |metric: Metric| {
            let raw = self.jitter.low + (self.jitter.high - self.jitter.low) * rng.next_unit(metric);
            let factor = match previous {
                Some(prev) => {
                    let last = prev.jitter.get(metric);
                    last + (raw - last) * self.jitter.smoothing
                }
                None => raw,
            };
            non_negative(factor)
        };
        JitterFactors {
            throughput:      draw(Metric::Throughput),
            average_value:   draw(Metric::AverageValue),
            queue_depth:     draw(Metric::QueueDepth),
            liquidity_usage: draw(Metric::LiquidityUsage),
        }
    }
}

fn same_day_not_later(previous: NaiveDateTime, now: NaiveDateTime) -> bool {
    previous.date() == now.date() && previous <= now
}

fn non_negative(x: f64) -> f64 {
    if x.is_finite() { x.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ConstantJitter;

    fn model() -> MetricsModel {
        MetricsModel::from_config(&EmulationConfig::default()).unwrap()
    }

    #[test]
    fn curve_hits_edges_and_base() {
        let c = PhaseCurve { left: 10.0, base: 50.0, right: 30.0 };
        assert!((c.level(0.0) - 10.0).abs() < 1e-12);
        assert!((c.level(50.0) - 50.0).abs() < 1e-12);
        assert!((c.level(100.0) - 30.0).abs() < 1e-12);
    }

    #[test]
    fn full_integral_matches_trapezoid_of_halves() {
        let c = PhaseCurve { left: 10.0, base: 50.0, right: 30.0 };
        // (L + 2B + R) / 4
        assert!((c.integral(100.0) - 35.0).abs() < 1e-12);
        assert!((c.integral(50.0) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn step_phase_opens_at_floor() {
        let m = model();
        let sod = m.table().index_of("Start-of-Day").unwrap();
        let c = m.curve(sod, Metric::QueueDepth);
        assert!((c.left - 60.0 * 0.05).abs() < 1e-12);
        // The phase before a step ends on its own base.
        let before = m.curve(sod - 1, Metric::QueueDepth);
        assert_eq!(before.right, before.base);
    }

    #[test]
    fn no_jitter_gives_neutral_factors() {
        let m = MetricsModel::new(PhaseTable::standard(), JitterConfig::none(), 1000.0);
        let t = EmulationConfig::default().reference_datetime();
        let bundle = m.derive_at(3, 50.0, t, None, &mut ConstantJitter(0.7));
        assert_eq!(bundle.jitter, JitterFactors::NEUTRAL);
        assert!((bundle.transactions_per_minute - 1450.0).abs() < 1e-9);
    }

    #[test]
    fn smoothing_pulls_toward_previous_factor() {
        let m = model();
        let t = EmulationConfig::default().reference_datetime();
        let first = m.derive_at(3, 10.0, t, None, &mut ConstantJitter(0.0));
        assert!((first.jitter.throughput - 0.9).abs() < 1e-12);

        let second = m.derive_at(3, 11.0, t, Some(&first), &mut ConstantJitter(0.999_999));
        // 0.9 + (~1.1 - 0.9) * 0.35
        assert!((second.jitter.throughput - 0.97).abs() < 1e-4);
    }

    #[test]
    fn totals_accrue_from_previous_bundle() {
        let m = MetricsModel::new(PhaseTable::standard(), JitterConfig::none(), 1000.0);
        let t = EmulationConfig::default().reference_datetime();
        let first = m.derive_at(3, 10.0, t, None, &mut ConstantJitter(0.5));
        let second = m.derive_at(3, 20.0, t + chrono::Duration::minutes(45), Some(&first), &mut ConstantJitter(0.5));

        let expected = m.cumulative_throughput(3, 20.0);
        assert!((second.accrued_transactions - expected).abs() < 1e-6);
        assert!(second.settlement_value > first.settlement_value);

        // A bundle from another day does not carry over.
        let next_day = t + chrono::Duration::days(1);
        let fresh = m.derive_at(3, 10.0, next_day, Some(&second), &mut ConstantJitter(0.5));
        assert!((fresh.accrued_transactions - first.accrued_transactions).abs() < 1e-6);
    }
}
