#![forbid(unsafe_code)]

use thiserror::Error;

use forge_core::ForgeError;
use forge_exec::EngineError;

#[derive(Debug, Error)]
pub enum ProbeError {
    /// Every exploratory handshake failed; nothing about the target is known.
    #[error("probing exhausted: all {attempted} exploratory handshakes failed")]
    ProbingExhaustion { attempted: usize },

    #[error("client synchronization failed: {0}")]
    Synchronization(String),

    #[error("capability scanner failed: {0}")]
    Scanner(String),

    #[error("feature report cache: {0}")]
    Cache(#[from] ForgeError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ProbeError {
    /// Whether the run has to abort.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProbeError::ProbingExhaustion { .. })
    }
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;
