use crate::clock::SimSpeed;
use serde::{Deserialize, Serialize};

/// Operator commands against the emulated clock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClockCommand {
    Start,
    Pause,
    Reset,
    SetSpeed { speed: SimSpeed },
}
