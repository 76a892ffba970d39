//! Single-writer handle for driving one emulator from several threads.
//!
//! RULE: Every mutation goes through the mutex, so ticks are serialised
//! and emulated time stays monotonic. Readers get owned copies and never
//! see the clock mid-update.

use crate::{
    clock::ClockSnapshot,
    command::ClockCommand,
    engine::{BusinessDayEmulator, Subscription},
    error::{EmulationError, EmulationResult},
    event::DayEvent,
    metrics::MetricsBundle,
    snapshot::{ClockView, EmulatorSnapshot},
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct SharedEmulator {
    inner: Arc<Mutex<BusinessDayEmulator>>,
}

impl SharedEmulator {
    pub fn new(emulator: BusinessDayEmulator) -> Self {
        Self { inner: Arc::new(Mutex::new(emulator)) }
    }

    fn lock(&self) -> EmulationResult<MutexGuard<'_, BusinessDayEmulator>> {
        self.inner.lock().map_err(|_| EmulationError::LockPoisoned)
    }

    /// Run `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut BusinessDayEmulator) -> R) -> EmulationResult<R> {
        let mut guard = self.lock()?;
        Ok(f(&mut *guard))
    }

    pub fn tick(&self, now_wall: DateTime<Utc>) -> EmulationResult<Vec<DayEvent>> {
        self.with(|e| e.tick(now_wall))
    }

    pub fn tick_now(&self) -> EmulationResult<Vec<DayEvent>> {
        self.with(|e| e.tick_now())
    }

    pub fn apply(&self, command: ClockCommand) -> EmulationResult<Vec<DayEvent>> {
        self.with(|e| e.apply(command))
    }

    pub fn subscribe(&self) -> EmulationResult<Subscription> {
        self.with(|e| e.subscribe())
    }

    pub fn clock_snapshot(&self) -> EmulationResult<ClockSnapshot> {
        self.with(|e| e.clock().snapshot())
    }

    pub fn clock_view(&self) -> EmulationResult<ClockView> {
        self.with(|e| e.clock_view())
    }

    pub fn metrics_snapshot(&self) -> EmulationResult<MetricsBundle> {
        self.with(|e| e.metrics().clone())
    }

    pub fn snapshot(&self) -> EmulationResult<EmulatorSnapshot> {
        self.with(|e| e.snapshot())
    }
}
