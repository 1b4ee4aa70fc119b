#![forbid(unsafe_code)]

//! Failure taxonomy of test execution.

use serde::{Deserialize, Serialize};
use std::any::Any;
use thiserror::Error;
use tracing::warn;

/// Why a test case ended up FAILED.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TestFailure {
    /// The target violated the behavior the test asserts.
    #[error("assertion failed: {0}")]
    Assertion(String),
    /// The engine or a test body broke unexpectedly.
    #[error("engine failure: {0}")]
    Engine(String),
}

impl TestFailure {
    pub fn assertion(message: impl Into<String>) -> Self {
        TestFailure::Assertion(message.into())
    }

    pub fn is_engine(&self) -> bool {
        matches!(self, TestFailure::Engine(_))
    }

    /// Engine failure carrying the message of a caught panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        TestFailure::Engine(panic_message(payload))
    }
}

/// Failures of the execution machinery itself.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("worker pool {0} is shut down")]
    PoolClosed(&'static str),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to run recovery command {command:?}: {source}")]
    Recovery {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write run report: {0}")]
    Report(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Message of a panic payload. Payloads that are neither `&str` nor `String`
/// carry no message; they are reported as an unspecified failure.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(_) => {
            warn!("panic payload carried no message");
            "unspecified failure".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_engine_failures() {
        let caught = std::panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(TestFailure::from_panic(caught), TestFailure::Engine("boom 1".into()));

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(42u32)).unwrap_err();
        assert_eq!(panic_message(caught), "unspecified failure");
    }
}
