//! Events the emulator publishes to its subscribers.
//!
//! RULE: Consumers learn about clock and metric changes ONLY through
//! these events (or a snapshot). Nothing polls the emulator's internals.

use crate::{clock::SimSpeed, metrics::MetricsBundle, types::PhaseName};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DayEvent {
    // ── Clock control ──────────────────────────────
    ClockStarted {
        emulated_time: NaiveDateTime,
    },
    ClockPaused {
        emulated_time: NaiveDateTime,
    },
    ClockReset {
        emulated_time: NaiveDateTime,
    },
    SpeedChanged {
        speed: SimSpeed,
        acceleration_factor: f64,
    },

    // ── Time advance ───────────────────────────────
    Ticked {
        emulated_time: NaiveDateTime,
        advanced_ms: i64,
    },
    PhaseChanged {
        emulated_time: NaiveDateTime,
        from: PhaseName,
        to: PhaseName,
    },
    DayRolledOver {
        date: NaiveDate,
    },
    DayClamped {
        emulated_time: NaiveDateTime,
    },

    // ── Derived metrics ────────────────────────────
    MetricsPublished {
        bundle: MetricsBundle,
    },
}

impl DayEvent {
    /// Stable name for logs and the runner.
    pub fn type_name(&self) -> &'static str {
        match self {
            DayEvent::ClockStarted { .. }     => "clock_started",
            DayEvent::ClockPaused { .. }      => "clock_paused",
            DayEvent::ClockReset { .. }       => "clock_reset",
            DayEvent::SpeedChanged { .. }     => "speed_changed",
            DayEvent::Ticked { .. }           => "ticked",
            DayEvent::PhaseChanged { .. }     => "phase_changed",
            DayEvent::DayRolledOver { .. }    => "day_rolled_over",
            DayEvent::DayClamped { .. }       => "day_clamped",
            DayEvent::MetricsPublished { .. } => "metrics_published",
        }
    }
}
