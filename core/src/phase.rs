//! The phase table — an ordered partition of the emulated business day.
//!
//! RULE: Phases cover [0, 1440) minutes with no gaps and no overlaps.
//! A table that breaks the partition is a configuration bug and the
//! emulator refuses to start with it.

use crate::{
    error::{EmulationError, EmulationResult},
    types::{Minutes, PhaseName, MINUTES_PER_DAY},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How metrics enter a phase from the one before it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Metrics carry on smoothly from the previous phase.
    #[default]
    Blend,
    /// Metrics restart from a low floor (e.g. queue cleared at day open).
    Step,
}

/// Per-phase base values, one per metric family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PhaseProfile {
    /// Transactions per emulated minute.
    pub throughput:      f64,
    /// Average transaction value, in millions.
    pub average_value:   f64,
    /// Payments waiting in the settlement queue.
    pub queue_depth:     f64,
    /// Fraction of available liquidity in use, 0..=1.
    pub liquidity_usage: f64,
}

impl PhaseProfile {
    pub const fn new(throughput: f64, average_value: f64, queue_depth: f64, liquidity_usage: f64) -> Self {
        Self { throughput, average_value, queue_depth, liquidity_usage }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Throughput     => self.throughput,
            Metric::AverageValue   => self.average_value,
            Metric::QueueDepth     => self.queue_depth,
            Metric::LiquidityUsage => self.liquidity_usage,
        }
    }
}

/// The metric families a profile carries a base value for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Throughput,
    AverageValue,
    QueueDepth,
    LiquidityUsage,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Throughput,
        Metric::AverageValue,
        Metric::QueueDepth,
        Metric::LiquidityUsage,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    pub name:         PhaseName,
    pub start_offset: Minutes,
    pub end_offset:   Minutes,
    #[serde(default)]
    pub description:  String,
    #[serde(default)]
    pub transition:   Transition,
    pub profile:      PhaseProfile,
}

impl Phase {
    pub fn new(
        name: &str,
        start_offset: Minutes,
        end_offset: Minutes,
        description: &str,
        transition: Transition,
        profile: PhaseProfile,
    ) -> Self {
        Self {
            name: name.to_string(),
            start_offset,
            end_offset,
            description: description.to_string(),
            transition,
            profile,
        }
    }

    /// Length of the phase in minutes.
    pub fn duration(&self) -> Minutes {
        self.end_offset - self.start_offset
    }

    /// Half-open containment: `start <= minute < end`.
    pub fn contains(&self, minute_of_day: f64) -> bool {
        minute_of_day >= f64::from(self.start_offset) && minute_of_day < f64::from(self.end_offset)
    }

    /// `"08:30–16:00"`, for logs and the runner.
    pub fn window_label(&self) -> String {
        format!("{}–{}", hhmm(self.start_offset), hhmm(self.end_offset))
    }
}

fn hhmm(offset: Minutes) -> String {
    format!("{:02}:{:02}", offset / 60, offset % 60)
}

/// A validated, ordered partition of the business day.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhaseTable {
    phases: Vec<Phase>,
}

impl PhaseTable {
    /// Validate and wrap a list of phases.
    pub fn new(phases: Vec<Phase>) -> EmulationResult<Self> {
        validate_partition(&phases)?;
        Ok(Self { phases })
    }

    /// The built-in RTGS business day.
    pub fn standard() -> Self {
        match Self::new(standard_phases()) {
            Ok(table) => table,
            Err(e) => panic!("built-in phase table breaks the day partition: {e}"),
        }
    }

    /// The fixed, ordered partition of the business day.
    pub fn get_phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn last_index(&self) -> usize {
        self.phases.len() - 1
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name == name)
    }

    /// Next phase, wrapping from the last phase back to the first.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.phases.len()
    }

    /// Previous phase, wrapping from the first phase to the last.
    pub fn previous_index(&self, index: usize) -> usize {
        (index + self.phases.len() - 1) % self.phases.len()
    }
}

fn validate_partition(phases: &[Phase]) -> EmulationResult<()> {
    let (first, last) = match (phases.first(), phases.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(EmulationError::configuration("phase table is empty")),
    };
    if first.start_offset != 0 {
        return Err(EmulationError::configuration(format!(
            "first phase '{}' starts at minute {}, expected 0",
            first.name, first.start_offset
        )));
    }
    if last.end_offset != MINUTES_PER_DAY {
        return Err(EmulationError::configuration(format!(
            "last phase '{}' ends at minute {}, expected {MINUTES_PER_DAY}",
            last.name, last.end_offset
        )));
    }

    let mut names = HashSet::new();
    for phase in phases {
        if phase.start_offset >= phase.end_offset {
            return Err(EmulationError::configuration(format!(
                "phase '{}' has start {} >= end {}",
                phase.name, phase.start_offset, phase.end_offset
            )));
        }
        if !names.insert(phase.name.as_str()) {
            return Err(EmulationError::configuration(format!(
                "phase name '{}' appears more than once",
                phase.name
            )));
        }
        validate_profile(phase)?;
    }

    for pair in phases.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.end_offset != b.start_offset {
            let kind = if a.end_offset < b.start_offset { "gap" } else { "overlap" };
            return Err(EmulationError::configuration(format!(
                "{kind} between '{}' (ends {}) and '{}' (starts {})",
                a.name, a.end_offset, b.name, b.start_offset
            )));
        }
    }
    Ok(())
}

fn validate_profile(phase: &Phase) -> EmulationResult<()> {
    for metric in Metric::ALL {
        let v = phase.profile.get(metric);
        if !v.is_finite() || v < 0.0 {
            return Err(EmulationError::configuration(format!(
                "phase '{}' has invalid {metric:?} base value {v}",
                phase.name
            )));
        }
    }
    if phase.profile.liquidity_usage > 1.0 {
        return Err(EmulationError::configuration(format!(
            "phase '{}' liquidity usage {} exceeds 1.0",
            phase.name, phase.profile.liquidity_usage
        )));
    }
    Ok(())
}

/// Default phases. Numbers are tuned for the dashboards and carry no
/// policy meaning; override them through `data/business_day/phases.json`.
pub fn standard_phases() -> Vec<Phase> {
    use Transition::{Blend, Step};
    vec![
        Phase::new("Night-Time Settlement", 0, 360,
            "Overnight liquidity transfers and ancillary-system settlement",
            Blend, PhaseProfile::new(40.0, 2.5, 30.0, 0.15)),
        Phase::new("Start-of-Day", 360, 420,
            "Business day opens, queues cleared, standing orders executed",
            Step, PhaseProfile::new(120.0, 4.0, 60.0, 0.25)),
        Phase::new("Pre-Opening", 420, 510,
            "Warehoused payments released, participants position liquidity",
            Blend, PhaseProfile::new(380.0, 6.0, 180.0, 0.40)),
        Phase::new("Peak Trading", 510, 960,
            "Main day-trade window for customer and interbank payments",
            Blend, PhaseProfile::new(1450.0, 8.5, 420.0, 0.72)),
        Phase::new("Customer Cut-off", 960, 1020,
            "Last window for customer payments",
            Blend, PhaseProfile::new(980.0, 11.0, 260.0, 0.64)),
        Phase::new("Interbank Cut-off", 1020, 1080,
            "Last window for interbank payments and liquidity transfers",
            Blend, PhaseProfile::new(620.0, 18.0, 140.0, 0.55)),
        Phase::new("End-of-Day", 1080, 1140,
            "Standing facilities, reserve calculation, balance sweep",
            Blend, PhaseProfile::new(150.0, 24.0, 40.0, 0.30)),
        Phase::new("Maintenance Window", 1140, MINUTES_PER_DAY,
            "System closed for maintenance",
            Step, PhaseProfile::new(0.0, 0.0, 0.0, 0.05)),
    ]
}
