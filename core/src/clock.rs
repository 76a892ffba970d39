//! Simulated clock — owns emulated time, speed control, and pause.
//!
//! RULE: Emulated time only moves forward, and only while running.
//! `tick()` is the single place time advances; callers must serialise
//! ticks (see `shared.rs`) so that monotonicity holds.

use crate::config::{EmulationConfig, DEFAULT_MAX_TICK_DELTA_MS};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

/// Source of real (wall) time.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock that only moves when told to. Used by tests and batch runs.
#[derive(Debug)]
pub struct ManualWallClock {
    current: RwLock<DateTime<Utc>>,
}

impl ManualWallClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { current: RwLock::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut t = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *t += by;
    }

    pub fn advance_millis(&self, ms: i64) {
        self.advance(Duration::milliseconds(ms));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl WallClock for ManualWallClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How a single oversized wall delta (e.g. a suspended process) is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DriftPolicy {
    /// Clamp one tick's wall delta to at most `max_delta_ms`.
    Cap { max_delta_ms: i64 },
    /// Apply the whole delta, however large.
    FastForward,
}

impl Default for DriftPolicy {
    fn default() -> Self {
        Self::Cap { max_delta_ms: DEFAULT_MAX_TICK_DELTA_MS }
    }
}

/// What happens when emulated time reaches midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DayBoundaryPolicy {
    /// Carry on into the next emulated date.
    #[default]
    Rollover,
    /// Stop at the last millisecond of the day and pause.
    Clamp,
}

/// Acceleration preset. A `Custom` factor must be finite and positive;
/// deserialisation rejects anything else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "SpeedRepr", into = "SpeedRepr")]
pub enum SimSpeed {
    RealTime,      // 1x
    Demo,          // 60x   (1 real second = 1 emulated minute)
    Rapid,         // 600x  (a business day in ~2.5 real minutes)
    Custom(f64),
}

/// Wire shape of `SimSpeed`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SpeedRepr {
    RealTime,
    Demo,
    Rapid,
    Custom(f64),
}

impl TryFrom<SpeedRepr> for SimSpeed {
    type Error = String;

    fn try_from(repr: SpeedRepr) -> Result<Self, Self::Error> {
        let speed = match repr {
            SpeedRepr::RealTime  => Self::RealTime,
            SpeedRepr::Demo      => Self::Demo,
            SpeedRepr::Rapid     => Self::Rapid,
            SpeedRepr::Custom(f) => Self::Custom(f),
        };
        if speed.is_valid() {
            Ok(speed)
        } else {
            Err(format!("speed factor must be finite and positive, got {}", speed.factor()))
        }
    }
}

impl From<SimSpeed> for SpeedRepr {
    fn from(speed: SimSpeed) -> Self {
        match speed {
            SimSpeed::RealTime  => Self::RealTime,
            SimSpeed::Demo      => Self::Demo,
            SimSpeed::Rapid     => Self::Rapid,
            SimSpeed::Custom(f) => Self::Custom(f),
        }
    }
}

impl SimSpeed {
    pub fn from_factor(factor: f64) -> Self {
        if factor == 1.0 {
            Self::RealTime
        } else if factor == 60.0 {
            Self::Demo
        } else if factor == 600.0 {
            Self::Rapid
        } else {
            Self::Custom(factor)
        }
    }

    /// Emulated seconds per real second.
    pub fn factor(&self) -> f64 {
        match self {
            Self::RealTime  => 1.0,
            Self::Demo      => 60.0,
            Self::Rapid     => 600.0,
            Self::Custom(f) => *f,
        }
    }

    /// Time only moves forward at a finite, positive factor.
    pub fn is_valid(&self) -> bool {
        let f = self.factor();
        f.is_finite() && f > 0.0
    }
}

impl FromStr for SimSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realtime" | "real_time" => Ok(Self::RealTime),
            "demo" => Ok(Self::Demo),
            "rapid" => Ok(Self::Rapid),
            other => other
                .parse::<f64>()
                .ok()
                .map(Self::from_factor)
                .filter(Self::is_valid)
                .ok_or_else(|| format!("unknown speed '{other}'")),
        }
    }
}

/// What one `tick()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Emulated time added by this tick.
    pub advanced:     Duration,
    /// Number of emulated midnights crossed.
    pub days_rolled:  i64,
    /// The day-boundary clamp stopped the clock.
    pub clamped:      bool,
    /// The drift cap shortened the wall delta.
    pub delta_capped: bool,
}

impl Default for TickOutcome {
    fn default() -> Self {
        Self {
            advanced:     Duration::zero(),
            days_rolled:  0,
            clamped:      false,
            delta_capped: false,
        }
    }
}

impl TickOutcome {
    pub fn rolled_over(&self) -> bool {
        self.days_rolled > 0
    }
}

/// Immutable copy of the clock state, safe to hand to readers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ClockSnapshot {
    pub emulated_time:       NaiveDateTime,
    pub is_running:          bool,
    pub acceleration_factor: f64,
}

pub struct SimulatedClock {
    emulated_time:    NaiveDateTime,
    is_running:       bool,
    speed:            SimSpeed,
    last_wall_sample: Option<DateTime<Utc>>,
    /// Sub-nanosecond remainder carried between ticks.
    carry_ns:         f64,
    reference_start:  NaiveDateTime,
    drift_policy:     DriftPolicy,
    day_boundary:     DayBoundaryPolicy,
    wall:             Arc<dyn WallClock>,
}

impl SimulatedClock {
    /// A paused clock sitting at the configured reference start.
    pub fn new(config: &EmulationConfig, wall: Arc<dyn WallClock>) -> Self {
        let reference_start = config.reference_datetime();
        Self {
            emulated_time: reference_start,
            is_running: false,
            speed: SimSpeed::from_factor(config.acceleration_factor),
            last_wall_sample: None,
            carry_ns: 0.0,
            reference_start,
            drift_policy: config.drift_policy,
            day_boundary: config.day_boundary,
            wall,
        }
    }

    pub fn emulated_time(&self) -> NaiveDateTime { self.emulated_time }
    pub fn is_running(&self) -> bool { self.is_running }
    pub fn speed(&self) -> SimSpeed { self.speed }
    pub fn acceleration_factor(&self) -> f64 { self.speed.factor() }
    pub fn reference_start(&self) -> NaiveDateTime { self.reference_start }
    pub fn last_wall_sample(&self) -> Option<DateTime<Utc>> { self.last_wall_sample }

    /// Sample the injected wall clock.
    pub fn wall_now(&self) -> DateTime<Utc> {
        self.wall.now()
    }

    /// Returns false if the clock was already running.
    pub fn start(&mut self) -> bool {
        if self.is_running {
            return false;
        }
        self.is_running = true;
        self.last_wall_sample = Some(self.wall.now());
        true
    }

    /// Returns false if the clock was already paused.
    pub fn pause(&mut self) -> bool {
        if !self.is_running {
            return false;
        }
        self.is_running = false;
        true
    }

    /// Back to the reference start. The running flag is left alone.
    pub fn reset(&mut self) {
        self.emulated_time = self.reference_start;
        self.carry_ns = 0.0;
        if self.is_running {
            self.last_wall_sample = Some(self.wall.now());
        }
    }

    /// Returns false if the speed did not change. Non-finite or
    /// non-positive factors are refused.
    pub fn set_speed(&mut self, speed: SimSpeed) -> bool {
        if !speed.is_valid() {
            log::warn!("rejected speed {speed:?}: factor must be finite and positive");
            return false;
        }
        if self.speed == speed {
            return false;
        }
        self.speed = speed;
        true
    }

    /// Advance emulated time by the wall time elapsed since the last sample.
    /// No-op while paused.
    pub fn tick(&mut self, now_wall: DateTime<Utc>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if !self.is_running {
            return outcome;
        }
        let last = match self.last_wall_sample.replace(now_wall) {
            Some(last) => last,
            None => return outcome,
        };

        let mut delta = now_wall - last;
        if delta < Duration::zero() {
            log::warn!("wall clock went backwards by {}ms; holding emulated time", -delta.num_milliseconds());
            delta = Duration::zero();
        }
        if let DriftPolicy::Cap { max_delta_ms } = self.drift_policy {
            let cap = Duration::milliseconds(max_delta_ms);
            if delta > cap {
                log::debug!("capping wall delta {}ms to {max_delta_ms}ms", delta.num_milliseconds());
                delta = cap;
                outcome.delta_capped = true;
            }
        }

        let wall_ns = delta.num_nanoseconds().unwrap_or(i64::MAX) as f64;
        let emulated_ns = wall_ns * self.acceleration_factor() + self.carry_ns;
        let whole = emulated_ns.floor().min(i64::MAX as f64);
        self.carry_ns = emulated_ns - whole;

        self.advance_by(Duration::nanoseconds(whole as i64), &mut outcome);
        outcome
    }

    fn advance_by(&mut self, step: Duration, outcome: &mut TickOutcome) {
        let before = self.emulated_time;
        let target = before.checked_add_signed(step).unwrap_or(before);

        if target.date() != before.date() {
            match self.day_boundary {
                DayBoundaryPolicy::Rollover => {
                    outcome.days_rolled = (target.date() - before.date()).num_days();
                    self.emulated_time = target;
                }
                DayBoundaryPolicy::Clamp => {
                    let last_instant = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
                        .unwrap_or(NaiveTime::MIN);
                    self.emulated_time = before.date().and_time(last_instant).max(before);
                    self.carry_ns = 0.0;
                    self.is_running = false;
                    outcome.clamped = true;
                    log::info!("emulated day {} ended; clock clamped and paused", before.date());
                }
            }
        } else {
            self.emulated_time = target;
        }
        outcome.advanced = self.emulated_time - before;
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            emulated_time:       self.emulated_time,
            is_running:          self.is_running,
            acceleration_factor: self.acceleration_factor(),
        }
    }
}

impl std::fmt::Debug for SimulatedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedClock")
            .field("emulated_time", &self.emulated_time)
            .field("is_running", &self.is_running)
            .field("speed", &self.speed)
            .field("last_wall_sample", &self.last_wall_sample)
            .field("drift_policy", &self.drift_policy)
            .field("day_boundary", &self.day_boundary)
            .finish()
    }
}
