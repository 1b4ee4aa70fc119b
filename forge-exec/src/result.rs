#![forbid(unsafe_code)]

//! Per-test-case result aggregation.
//!
//! A [`TestCaseResult`] starts UNSTARTED, accumulates [`RunOutcome`]s while
//! its combinations execute and ends in exactly one terminal verdict. Once
//! terminal, neither the verdict nor the stored cause or reason changes.
//!
//! Outcomes are expected one per submitted interaction. The runner seals the
//! result once every combination has submitted its interactions; the result
//! then finalizes as soon as every expected outcome has been received. All
//! transitions happen under one lock per result, since sibling interactions
//! complete on different tier-1 workers.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::TestFailure;
use crate::outcome::RunOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Unstarted,
    Running,
    Succeeded,
    Failed,
    Disabled,
}

impl Verdict {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Verdict::Succeeded | Verdict::Failed | Verdict::Disabled)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Unstarted => "UNSTARTED",
            Verdict::Running => "RUNNING",
            Verdict::Succeeded => "SUCCEEDED",
            Verdict::Failed => "FAILED",
            Verdict::Disabled => "DISABLED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    verdict: Option<Verdict>,
    outcomes: Vec<RunOutcome>,
    expected: usize,
    received: usize,
    sealed: bool,
    cause: Option<TestFailure>,
    disabled_reason: Option<String>,
}

impl State {
    fn verdict(&self) -> Verdict {
        self.verdict.unwrap_or(Verdict::Unstarted)
    }

    fn terminal(&self) -> bool {
        self.verdict().is_terminal()
    }

    fn complete(&self) -> bool {
        self.sealed && self.received >= self.expected
    }
}

/// Point-in-time copy of a result, used for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub id: String,
    pub verdict: Verdict,
    pub cause: Option<TestFailure>,
    pub engine_failure: bool,
    pub disabled_reason: Option<String>,
    pub outcomes: Vec<RunOutcome>,
}

#[derive(Debug)]
pub struct TestCaseResult {
    id: String,
    state: Mutex<State>,
}

impl TestCaseResult {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), state: Mutex::new(State::default()) }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn verdict(&self) -> Verdict {
        self.state.lock().verdict()
    }

    /// Reject the test before any interaction runs. Only an UNSTARTED result
    /// can be disabled.
    pub fn disable(&self, reason: impl Into<String>) -> Verdict {
        let mut state = self.state.lock();
        match state.verdict() {
            Verdict::Unstarted => {
                let reason = reason.into();
                info!(test = %self.id, reason = %reason, "test disabled");
                state.disabled_reason = Some(reason);
                state.verdict = Some(Verdict::Disabled);
            }
            other => debug!(test = %self.id, verdict = %other, "disable ignored"),
        }
        state.verdict()
    }

    /// Announce `count` further outcomes. Ignored after sealing.
    pub fn expect(&self, count: usize) {
        let mut state = self.state.lock();
        if state.sealed || state.terminal() {
            return;
        }
        state.expected += count;
        state.verdict = Some(Verdict::Running);
    }

    /// Record one outcome together with the verdict of its assertion logic.
    pub fn record(&self, outcome: RunOutcome, assertion: Result<(), TestFailure>) -> Verdict {
        let mut state = self.state.lock();
        match state.verdict() {
            Verdict::Failed => {
                // siblings of the failing combination stay visible in the report
                state.outcomes.push(outcome);
                return Verdict::Failed;
            }
            Verdict::Succeeded | Verdict::Disabled => {
                debug!(test = %self.id, "outcome after final verdict ignored");
                return state.verdict();
            }
            Verdict::Unstarted | Verdict::Running => {}
        }
        state.verdict = Some(Verdict::Running);
        state.received += 1;
        state.outcomes.push(outcome);
        if let Err(failure) = assertion {
            Self::fail_locked(&self.id, &mut state, failure);
        } else if state.complete() {
            Self::succeed_locked(&self.id, &mut state);
        }
        state.verdict()
    }

    /// Fail without an outcome, e.g. when the test body itself broke.
    pub fn fail(&self, failure: TestFailure) -> Verdict {
        let mut state = self.state.lock();
        if !state.terminal() {
            Self::fail_locked(&self.id, &mut state, failure);
        }
        state.verdict()
    }

    /// No further interactions will be announced.
    pub fn seal(&self) -> Verdict {
        let mut state = self.state.lock();
        state.sealed = true;
        if !state.terminal() && state.complete() {
            Self::succeed_locked(&self.id, &mut state);
        }
        state.verdict()
    }

    /// Finalize if every expected outcome is in; returns the current verdict
    /// otherwise. Calling it on a terminal result changes nothing.
    pub fn finalize(&self) -> Verdict {
        let mut state = self.state.lock();
        if !state.terminal() && state.complete() {
            Self::succeed_locked(&self.id, &mut state);
        }
        state.verdict()
    }

    pub fn snapshot(&self) -> ResultSnapshot {
        let state = self.state.lock();
        ResultSnapshot {
            id: self.id.clone(),
            verdict: state.verdict(),
            engine_failure: state.cause.as_ref().map_or(false, TestFailure::is_engine),
            cause: state.cause.clone(),
            disabled_reason: state.disabled_reason.clone(),
            outcomes: state.outcomes.clone(),
        }
    }

    fn fail_locked(id: &str, state: &mut State, failure: TestFailure) {
        if failure.is_engine() {
            warn!(test = %id, cause = %failure, "test failed with engine failure");
        } else {
            info!(test = %id, cause = %failure, "test failed");
        }
        state.cause = Some(failure);
        state.verdict = Some(Verdict::Failed);
    }

    fn succeed_locked(id: &str, state: &mut State) {
        debug!(test = %id, outcomes = state.received, "test succeeded");
        state.verdict = Some(Verdict::Succeeded);
    }
}
