//! Maps an emulated instant to the active phase and progress through it.

use crate::phase::{Phase, PhaseTable};
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseResolution {
    pub phase_index:      usize,
    pub phase:            Phase,
    /// Position inside the phase, 0..=100.
    pub progress_percent: f64,
    /// Fractional minutes since emulated midnight.
    pub minute_of_day:    f64,
}

/// Fractional minutes since midnight, including seconds and nanoseconds.
pub fn minute_of_day(t: NaiveDateTime) -> f64 {
    let secs = f64::from(t.num_seconds_from_midnight());
    let nanos = f64::from(t.nanosecond().min(999_999_999));
    (secs + nanos / 1e9) / 60.0
}

pub fn resolve_phase(table: &PhaseTable, emulated_time: NaiveDateTime) -> PhaseResolution {
    resolve_minute(table, minute_of_day(emulated_time))
}

/// Resolve a fractional minute offset directly.
pub fn resolve_minute(table: &PhaseTable, minute: f64) -> PhaseResolution {
    let phases = table.get_phases();
    // First phase whose end lies beyond the minute.
    let idx = phases.partition_point(|p| f64::from(p.end_offset) <= minute);

    let index = match phases.get(idx) {
        Some(p) if p.contains(minute) => idx,
        _ => {
            let fallback = table.last_index();
            log::warn!(
                "minute {minute:.3} not covered by the phase table; falling back to '{}'",
                phases[fallback].name
            );
            fallback
        }
    };

    let phase = &phases[index];
    let span = f64::from(phase.duration());
    let progress = ((minute - f64::from(phase.start_offset)) / span * 100.0).clamp(0.0, 100.0);

    PhaseResolution {
        phase_index:      index,
        phase:            phase.clone(),
        progress_percent: progress,
        minute_of_day:    minute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn boundary_minute_belongs_to_later_phase() {
        let table = PhaseTable::standard();
        let r = resolve_phase(&table, at(8, 30, 0));
        assert_eq!(r.phase.name, "Peak Trading");
        assert_eq!(r.progress_percent, 0.0);
    }

    #[test]
    fn midnight_is_first_phase() {
        let table = PhaseTable::standard();
        let r = resolve_phase(&table, at(0, 0, 0));
        assert_eq!(r.phase_index, 0);
    }

    #[test]
    fn last_second_of_day_is_last_phase() {
        let table = PhaseTable::standard();
        let r = resolve_phase(&table, at(23, 59, 59));
        assert_eq!(r.phase_index, table.last_index());
        assert!(r.progress_percent < 100.0 && r.progress_percent > 99.9);
    }

    #[test]
    fn seconds_move_progress() {
        let table = PhaseTable::standard();
        // Start-of-Day spans 60 minutes; 30 seconds in is 0.8333..%.
        let r = resolve_phase(&table, at(6, 0, 30));
        assert_eq!(r.phase.name, "Start-of-Day");
        assert!((r.progress_percent - 0.5 / 60.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_minute_falls_back_to_last_phase() {
        let table = PhaseTable::standard();
        let r = resolve_minute(&table, 1500.0);
        assert_eq!(r.phase_index, table.last_index());
        assert_eq!(r.progress_percent, 100.0);
    }
}
