//! dayclock-core: business day emulation for the FMI operations portal.
//!
//! An accelerated simulated clock, a phase table that partitions the
//! emulated day, a resolver from time to (phase, progress), and a
//! phase-weighted metrics generator that dashboards subscribe to.

pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod metrics;
pub mod phase;
pub mod resolver;
pub mod rng;
pub mod shared;
pub mod snapshot;
pub mod ticker;
pub mod types;

pub use clock::{ManualWallClock, SimSpeed, SimulatedClock, SystemWallClock, WallClock};
pub use config::EmulationConfig;
pub use engine::{BusinessDayEmulator, Subscription};
pub use error::{EmulationError, EmulationResult};
pub use event::DayEvent;
pub use metrics::{MetricsBundle, MetricsModel};
pub use phase::{Phase, PhaseTable};
pub use resolver::{resolve_phase, PhaseResolution};
