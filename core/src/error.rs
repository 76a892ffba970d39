use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmulationError {
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Emulator lock poisoned by a panicking writer")]
    LockPoisoned,

    #[error("Ticker thread already stopped")]
    TickerStopped,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EmulationError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration { reason: reason.into() }
    }
}

pub type EmulationResult<T> = Result<T, EmulationError>;
