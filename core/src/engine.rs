//! The business day emulator — one explicitly constructed instance per session.
//!
//! UPDATE ORDER (every tick, fixed):
//!   1. Clock advances from the wall delta (drift cap, day boundary).
//!   2. Phase resolver maps the new emulated time to (phase, progress).
//!   3. Metrics are derived, smoothed against the previous bundle.
//!   4. All events from steps 1–3 are sent to every live subscriber.
//!
//! RULES:
//!   - No global state. Whoever composes the UI owns the emulator.
//!   - All randomness flows through the injected JitterSource.
//!   - Subscribers learn about changes only through DayEvents.

use crate::{
    clock::{SimSpeed, SimulatedClock, SystemWallClock, TickOutcome, WallClock},
    command::ClockCommand,
    config::EmulationConfig,
    error::EmulationResult,
    event::DayEvent,
    metrics::{MetricsBundle, MetricsModel},
    phase::{Phase, PhaseTable},
    resolver::{resolve_phase, PhaseResolution},
    rng::{JitterBank, JitterSource},
    snapshot::{ClockView, EmulatorSnapshot},
    types::SubscriptionId,
};
use chrono::{DateTime, Utc};
use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc,
};

/// A live feed of emulator events. Dropping the receiver ends the subscription.
pub struct Subscription {
    pub id:       SubscriptionId,
    pub receiver: Receiver<DayEvent>,
}

pub struct BusinessDayEmulator {
    config:      EmulationConfig,
    model:       MetricsModel,
    clock:       SimulatedClock,
    jitter:      Box<dyn JitterSource>,
    resolution:  PhaseResolution,
    metrics:     MetricsBundle,
    subscribers: Vec<(SubscriptionId, Sender<DayEvent>)>,
}

impl BusinessDayEmulator {
    /// Validate the configuration and build a paused emulator at the
    /// reference start. An invalid phase table is refused here.
    pub fn new(
        config: EmulationConfig,
        wall: Arc<dyn WallClock>,
        mut jitter: Box<dyn JitterSource>,
    ) -> EmulationResult<Self> {
        let model = MetricsModel::from_config(&config)?;
        let clock = SimulatedClock::new(&config, wall);
        let resolution = resolve_phase(model.table(), clock.emulated_time());
        let metrics = model.derive_metrics(&resolution, clock.emulated_time(), None, jitter.as_mut());

        log::info!(
            "emulator ready: {} phases, {}x, reset point {} ({})",
            model.table().len(),
            clock.acceleration_factor(),
            clock.reference_start(),
            resolution.phase.name
        );

        Ok(Self {
            config,
            model,
            clock,
            jitter,
            resolution,
            metrics,
            subscribers: Vec::new(),
        })
    }

    /// Reproducible jitter from a fixed seed.
    pub fn with_seed(config: EmulationConfig, wall: Arc<dyn WallClock>, seed: u64) -> EmulationResult<Self> {
        Self::new(config, wall, Box::new(JitterBank::new(seed)))
    }

    /// System wall clock and entropy-seeded jitter, for interactive sessions.
    pub fn build(config: EmulationConfig) -> EmulationResult<Self> {
        Self::new(config, Arc::new(SystemWallClock), Box::new(JitterBank::from_entropy()))
    }

    pub fn config(&self) -> &EmulationConfig {
        &self.config
    }

    pub fn phase_table(&self) -> &PhaseTable {
        self.model.table()
    }

    pub fn get_phases(&self) -> &[Phase] {
        self.model.table().get_phases()
    }

    pub fn clock(&self) -> &SimulatedClock {
        &self.clock
    }

    pub fn resolution(&self) -> &PhaseResolution {
        &self.resolution
    }

    /// The current metrics bundle.
    pub fn metrics(&self) -> &MetricsBundle {
        &self.metrics
    }

    /// Clock state plus the active phase, as a dashboard header shows it.
    pub fn clock_view(&self) -> ClockView {
        ClockView {
            emulated_time:       self.clock.emulated_time(),
            is_running:          self.clock.is_running(),
            current_phase:       self.resolution.phase.clone(),
            progress_percent:    self.resolution.progress_percent,
            acceleration_factor: self.clock.acceleration_factor(),
        }
    }

    pub fn snapshot(&self) -> EmulatorSnapshot {
        EmulatorSnapshot {
            clock:      self.clock.snapshot(),
            resolution: self.resolution.clone(),
            metrics:    self.metrics.clone(),
        }
    }

    // ── Clock control ──────────────────────────────

    pub fn start(&mut self) -> Vec<DayEvent> {
        let mut events = vec![];
        if self.clock.start() {
            log::info!("clock started at {}", self.clock.emulated_time());
            events.push(DayEvent::ClockStarted { emulated_time: self.clock.emulated_time() });
        }
        self.publish(events)
    }

    pub fn pause(&mut self) -> Vec<DayEvent> {
        let mut events = vec![];
        if self.clock.pause() {
            log::info!("clock paused at {}", self.clock.emulated_time());
            events.push(DayEvent::ClockPaused { emulated_time: self.clock.emulated_time() });
        }
        self.publish(events)
    }

    /// Back to the reference start; metrics restart without smoothing.
    pub fn reset(&mut self) -> Vec<DayEvent> {
        self.clock.reset();
        log::info!("clock reset to {}", self.clock.emulated_time());
        let mut events = vec![DayEvent::ClockReset { emulated_time: self.clock.emulated_time() }];
        self.refresh(&mut events, false);
        self.publish(events)
    }

    pub fn set_speed(&mut self, speed: SimSpeed) -> Vec<DayEvent> {
        let mut events = vec![];
        if self.clock.set_speed(speed) {
            log::info!("speed set to {speed:?} ({}x)", speed.factor());
            events.push(DayEvent::SpeedChanged {
                speed,
                acceleration_factor: speed.factor(),
            });
        }
        self.publish(events)
    }

    pub fn apply(&mut self, command: ClockCommand) -> Vec<DayEvent> {
        match command {
            ClockCommand::Start => self.start(),
            ClockCommand::Pause => self.pause(),
            ClockCommand::Reset => self.reset(),
            ClockCommand::SetSpeed { speed } => self.set_speed(speed),
        }
    }

    // ── Time advance ───────────────────────────────

    /// Advance from a wall-clock sample. Returns the events published;
    /// empty when the clock is paused or nothing moved.
    pub fn tick(&mut self, now_wall: DateTime<Utc>) -> Vec<DayEvent> {
        let outcome = self.clock.tick(now_wall);
        if outcome == TickOutcome::default() {
            return vec![];
        }

        let now = self.clock.emulated_time();
        let mut events = vec![DayEvent::Ticked {
            emulated_time: now,
            advanced_ms:   outcome.advanced.num_milliseconds(),
        }];
        if outcome.rolled_over() {
            log::info!("emulated day rolled over to {}", now.date());
            events.push(DayEvent::DayRolledOver { date: now.date() });
        }
        if outcome.clamped {
            events.push(DayEvent::DayClamped { emulated_time: now });
            events.push(DayEvent::ClockPaused { emulated_time: now });
        }
        self.refresh(&mut events, true);
        self.publish(events)
    }

    /// Tick using the injected wall clock.
    pub fn tick_now(&mut self) -> Vec<DayEvent> {
        let now = self.clock.wall_now();
        self.tick(now)
    }

    fn refresh(&mut self, events: &mut Vec<DayEvent>, smooth: bool) {
        let now = self.clock.emulated_time();
        let resolution = resolve_phase(self.model.table(), now);

        if resolution.phase_index != self.resolution.phase_index {
            log::info!(
                "{now}: phase '{}' -> '{}'",
                self.resolution.phase.name,
                resolution.phase.name
            );
            events.push(DayEvent::PhaseChanged {
                emulated_time: now,
                from:          self.resolution.phase.name.clone(),
                to:            resolution.phase.name.clone(),
            });
        }

        let previous = if smooth { Some(&self.metrics) } else { None };
        let metrics = self.model.derive_metrics(&resolution, now, previous, self.jitter.as_mut());

        log::debug!(
            "{now} {} {:.1}% tpm={:.1} total={} queued={}",
            resolution.phase.name,
            resolution.progress_percent,
            metrics.transactions_per_minute,
            metrics.total_transactions,
            metrics.queued_payments
        );

        events.push(DayEvent::MetricsPublished { bundle: metrics.clone() });
        self.resolution = resolution;
        self.metrics = metrics;
    }

    // ── Subscriptions ──────────────────────────────

    pub fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let id = SubscriptionId::new_v4();
        self.subscribers.push((id, tx));
        log::debug!("subscriber {id} attached");
        Subscription { id, receiver: rx }
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Send every event to every subscriber; drop subscribers whose
    /// receiver has gone away.
    fn publish(&mut self, events: Vec<DayEvent>) -> Vec<DayEvent> {
        if events.is_empty() {
            return events;
        }
        self.subscribers.retain(|(id, tx)| {
            let alive = events.iter().all(|e| tx.send(e.clone()).is_ok());
            if !alive {
                log::debug!("subscriber {id} disconnected");
            }
            alive
        });
        events
    }
}

impl std::fmt::Debug for BusinessDayEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessDayEmulator")
            .field("clock", &self.clock)
            .field("phase", &self.resolution.phase.name)
            .field("progress_percent", &self.resolution.progress_percent)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
