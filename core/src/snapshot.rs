//! Read-only views of emulator state.
//!
//! `ClockView` and the current `MetricsBundle` are what dashboards bind to;
//! `EmulatorSnapshot` bundles both into one serialisable value.

use crate::{
    clock::ClockSnapshot,
    metrics::MetricsBundle,
    phase::Phase,
    resolver::PhaseResolution,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClockView {
    pub emulated_time:       NaiveDateTime,
    pub is_running:          bool,
    pub current_phase:       Phase,
    pub progress_percent:    f64,
    pub acceleration_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmulatorSnapshot {
    pub clock:      ClockSnapshot,
    pub resolution: PhaseResolution,
    pub metrics:    MetricsBundle,
}
