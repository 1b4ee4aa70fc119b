#![forbid(unsafe_code)]

//! Concurrent execution engine and result aggregation.
//!
//! Two thread-backed pools cooperate: test-case workers materialize one
//! combination each and run the test body, interaction workers drive the
//! protocol exchanges the body submits. An idle watchdog runs an external
//! recovery command when neither tier reports progress for too long.

pub mod case;
pub mod error;
pub mod outcome;
pub mod pool;
pub mod registry;
pub mod report;
pub mod result;
pub mod runner;
pub mod watchdog;

pub use case::{CaseHandle, Validator};
pub use error::{EngineError, EngineResult, TestFailure};
pub use outcome::{RunOutcome, RunStatus};
pub use pool::{InteractionPool, Progress, WorkerPool};
pub use registry::{Precondition, TestBody, TestDeclaration, TestRegistry, TestSpec};
pub use report::{OutcomeSummary, RunReport, RunSummary, TestReport, Volume, VolumeCounter};
pub use result::{ResultSnapshot, TestCaseResult, Verdict};
pub use runner::{RunContext, TestRunner};
pub use watchdog::{recovery_action, RecoveryCommand, Watchdog};
