use crate::{
    clock::{DayBoundaryPolicy, DriftPolicy},
    error::{EmulationError, EmulationResult},
    phase::{standard_phases, Phase, PhaseTable},
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ACCELERATION_FACTOR: f64 = 60.0;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_MAX_TICK_DELTA_MS: i64 = 5_000;
pub const DEFAULT_TOTAL_LIQUIDITY: f64 = 250_000.0;

/// Bounds and smoothing for the random factor applied to every metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct JitterConfig {
    pub low:        f64,
    pub high:       f64,
    /// Weight of a fresh draw against the previous factor, in (0, 1].
    pub smoothing:  f64,
    /// Fraction of the base value a `Step` phase opens at.
    pub step_floor: f64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            low:        0.9,
            high:       1.1,
            smoothing:  0.35,
            step_floor: 0.05,
        }
    }
}

impl JitterConfig {
    /// Jitter switched off: every factor is exactly 1.0.
    pub fn none() -> Self {
        Self { low: 1.0, high: 1.0, ..Self::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmulationConfig {
    /// Emulated seconds per real second.
    pub acceleration_factor: f64,
    pub reference_date:      NaiveDate,
    /// Where `reset()` puts the clock.
    pub reference_start:     NaiveTime,
    /// Period of the live ticker, in wall milliseconds.
    pub tick_interval_ms:    u64,
    pub drift_policy:        DriftPolicy,
    pub day_boundary:        DayBoundaryPolicy,
    pub jitter:              JitterConfig,
    /// Total participant liquidity, in millions.
    pub total_liquidity:     f64,
    pub phases:              Vec<Phase>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmulationFile {
    acceleration_factor: f64,
    reference_date:      NaiveDate,
    reference_start:     NaiveTime,
    #[serde(default = "default_tick_interval")]
    tick_interval_ms:    u64,
    #[serde(default)]
    drift_policy:        DriftPolicy,
    #[serde(default)]
    day_boundary:        DayBoundaryPolicy,
    #[serde(default)]
    jitter:              JitterConfig,
    #[serde(default = "default_total_liquidity")]
    total_liquidity:     f64,
}

#[derive(Debug, Clone, Deserialize)]
struct PhasesFile {
    phases: Vec<Phase>,
}

fn default_tick_interval() -> u64 { DEFAULT_TICK_INTERVAL_MS }
fn default_total_liquidity() -> f64 { DEFAULT_TOTAL_LIQUIDITY }

fn default_reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default()
}

fn default_reference_start() -> NaiveTime {
    NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default()
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            acceleration_factor: DEFAULT_ACCELERATION_FACTOR,
            reference_date:      default_reference_date(),
            reference_start:     default_reference_start(),
            tick_interval_ms:    DEFAULT_TICK_INTERVAL_MS,
            drift_policy:        DriftPolicy::default(),
            day_boundary:        DayBoundaryPolicy::default(),
            jitter:              JitterConfig::default(),
            total_liquidity:     DEFAULT_TOTAL_LIQUIDITY,
            phases:              standard_phases(),
        }
    }
}

impl EmulationConfig {
    /// Load from the data/ directory.
    /// In tests, use EmulationConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/business_day/emulation.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: EmulationFile = serde_json::from_str(&content)?;

        let phases_path = format!("{data_dir}/business_day/phases.json");
        let phases_content = std::fs::read_to_string(&phases_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {phases_path}: {e}"))?;
        let phases_file: PhasesFile = serde_json::from_str(&phases_content)?;

        let config = Self {
            acceleration_factor: file.acceleration_factor,
            reference_date:      file.reference_date,
            reference_start:     file.reference_start,
            tick_interval_ms:    file.tick_interval_ms,
            drift_policy:        file.drift_policy,
            day_boundary:        file.day_boundary,
            jitter:              file.jitter,
            total_liquidity:     file.total_liquidity,
            phases:              phases_file.phases,
        };
        config.validate()?;

        log::info!(
            "Loaded business day config from {data_dir}: {} phases, {}x acceleration",
            config.phases.len(),
            config.acceleration_factor
        );
        Ok(config)
    }

    /// Deterministic configuration for tests: 60x, clock reset to 08:30,
    /// uncapped ticks so scenario arithmetic stays exact.
    pub fn default_test() -> Self {
        Self {
            reference_start: NaiveTime::from_hms_opt(8, 30, 0).unwrap_or_default(),
            drift_policy:    DriftPolicy::FastForward,
            ..Self::default()
        }
    }

    /// The emulated instant `reset()` returns to.
    pub fn reference_datetime(&self) -> NaiveDateTime {
        self.reference_date.and_time(self.reference_start)
    }

    /// Check every numeric knob and build the phase table.
    /// Any failure here is fatal: the emulator refuses to start.
    pub fn validate(&self) -> EmulationResult<PhaseTable> {
        if !self.acceleration_factor.is_finite() || self.acceleration_factor <= 0.0 {
            return Err(EmulationError::configuration(format!(
                "acceleration factor must be positive, got {}",
                self.acceleration_factor
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(EmulationError::configuration("tick interval must be non-zero"));
        }
        if let DriftPolicy::Cap { max_delta_ms } = self.drift_policy {
            if max_delta_ms <= 0 {
                return Err(EmulationError::configuration(format!(
                    "drift cap must be positive, got {max_delta_ms} ms"
                )));
            }
        }
        let j = &self.jitter;
        if !(j.low.is_finite() && j.high.is_finite()) || j.low < 0.0 || j.low > j.high {
            return Err(EmulationError::configuration(format!(
                "jitter bounds must satisfy 0 <= low <= high, got [{}, {}]",
                j.low, j.high
            )));
        }
        if !(j.smoothing > 0.0 && j.smoothing <= 1.0) {
            return Err(EmulationError::configuration(format!(
                "jitter smoothing must be in (0, 1], got {}",
                j.smoothing
            )));
        }
        if !(0.0..=1.0).contains(&j.step_floor) {
            return Err(EmulationError::configuration(format!(
                "step floor must be in [0, 1], got {}",
                j.step_floor
            )));
        }
        if !self.total_liquidity.is_finite() || self.total_liquidity < 0.0 {
            return Err(EmulationError::configuration(format!(
                "total liquidity must be non-negative, got {}",
                self.total_liquidity
            )));
        }
        PhaseTable::new(self.phases.clone())
    }
}
