//! Periodic driver: calls `tick_now()` on a fixed wall interval.
//!
//! Ticks run on one background thread, one at a time, so they never
//! overlap. `stop()` (or dropping the ticker) ends the thread.

use crate::{
    error::{EmulationError, EmulationResult},
    shared::SharedEmulator,
};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct Ticker {
    stop:   Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn(emulator: SharedEmulator, interval: Duration) -> EmulationResult<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("day-ticker".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(e) = emulator.tick_now() {
                            log::error!("ticker stopping: {e}");
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| EmulationError::Other(anyhow::anyhow!("cannot spawn ticker thread: {e}")))?;

        log::debug!("ticker started, interval {interval:?}");
        Ok(Self {
            stop:   Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for the tick in flight to finish.
    pub fn stop(&mut self) -> EmulationResult<()> {
        let handle = self.handle.take().ok_or(EmulationError::TickerStopped)?;
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        handle
            .join()
            .map_err(|_| EmulationError::Other(anyhow::anyhow!("ticker thread panicked")))?;
        log::debug!("ticker stopped");
        Ok(())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}
