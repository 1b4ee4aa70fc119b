#![forbid(unsafe_code)]

//! Run-level report and summary.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use forge_core::{CipherSuite, Direction, MessageKind, ProtocolEpoch};

use crate::error::{EngineError, EngineResult};
use crate::outcome::{RunOutcome, RunStatus};
use crate::result::{ResultSnapshot, Verdict};

/// Planned and executed interaction volume for one epoch and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub epoch: ProtocolEpoch,
    pub direction: Direction,
    /// Interactions submitted.
    pub planned: usize,
    /// Interactions that reached the target.
    pub executed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub volumes: Vec<Volume>,
    pub succeeded: usize,
    pub failed: usize,
    pub disabled: usize,
    pub engine_failures: usize,
}

impl RunSummary {
    pub fn volume(&self, epoch: ProtocolEpoch, direction: Direction) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.epoch == epoch && v.direction == direction)
    }

    pub fn total_planned(&self) -> usize {
        self.volumes.iter().map(|v| v.planned).sum()
    }

    pub fn total_executed(&self) -> usize {
        self.volumes.iter().map(|v| v.executed).sum()
    }
}

/// Shared counters updated from both worker tiers.
#[derive(Debug, Default)]
pub struct VolumeCounter {
    counts: Mutex<BTreeMap<(ProtocolEpoch, Direction), (usize, usize)>>,
}

impl VolumeCounter {
    pub fn planned(&self, epoch: ProtocolEpoch, direction: Direction) {
        self.counts.lock().entry((epoch, direction)).or_default().0 += 1;
    }

    pub fn executed(&self, epoch: ProtocolEpoch, direction: Direction) {
        self.counts.lock().entry((epoch, direction)).or_default().1 += 1;
    }

    pub fn volumes(&self) -> Vec<Volume> {
        self.counts
            .lock()
            .iter()
            .map(|(&(epoch, direction), &(planned, executed))| Volume { epoch, direction, planned, executed })
            .collect()
    }
}

/// Outcome reduced to what an operator reads in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub combination: String,
    pub status: RunStatus,
    pub error: Option<String>,
    pub negotiated_suite: Option<CipherSuite>,
    pub alert: Option<u8>,
    pub received: Vec<MessageKind>,
}

impl From<&RunOutcome> for OutcomeSummary {
    fn from(outcome: &RunOutcome) -> Self {
        Self {
            combination: outcome.combination.clone(),
            status: outcome.status,
            error: outcome.error.as_ref().map(ToString::to_string),
            negotiated_suite: outcome.artifacts.negotiated_suite,
            alert: outcome.artifacts.alert,
            received: outcome.artifacts.received.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub id: String,
    pub description: String,
    pub verdict: Verdict,
    pub cause: Option<String>,
    pub engine_failure: bool,
    pub disabled_reason: Option<String>,
    pub outcomes: Vec<OutcomeSummary>,
}

impl TestReport {
    pub fn from_snapshot(snapshot: ResultSnapshot, description: impl Into<String>) -> Self {
        Self {
            id: snapshot.id,
            description: description.into(),
            verdict: snapshot.verdict,
            cause: snapshot.cause.as_ref().map(ToString::to_string),
            engine_failure: snapshot.engine_failure,
            disabled_reason: snapshot.disabled_reason,
            outcomes: snapshot.outcomes.iter().map(OutcomeSummary::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub target: String,
    pub direction: Direction,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tests: Vec<TestReport>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Assemble the report; verdict totals are derived from `tests`.
    pub fn new(
        target: impl Into<String>,
        direction: Direction,
        started_at: DateTime<Utc>,
        tests: Vec<TestReport>,
        volumes: Vec<Volume>,
    ) -> Self {
        let mut summary = RunSummary { volumes, ..Default::default() };
        for test in &tests {
            match test.verdict {
                Verdict::Succeeded => summary.succeeded += 1,
                Verdict::Failed => summary.failed += 1,
                Verdict::Disabled => summary.disabled += 1,
                Verdict::Unstarted | Verdict::Running => {}
            }
            if test.engine_failure {
                summary.engine_failures += 1;
            }
        }
        Self {
            run_id: Uuid::new_v4(),
            target: target.into(),
            direction,
            started_at,
            finished_at: Utc::now(),
            tests,
            summary,
        }
    }

    pub fn test(&self, id: &str) -> Option<&TestReport> {
        self.tests.iter().find(|t| t.id == id)
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Report(e.to_string()))
    }

    /// Write `report-<run id>.json` into `dir`.
    pub fn write_to(&self, dir: &Path) -> EngineResult<PathBuf> {
        let report = |e: std::io::Error| EngineError::Report(e.to_string());
        fs::create_dir_all(dir).map_err(report)?;
        let path = dir.join(format!("report-{}.json", self.run_id));
        fs::write(&path, self.to_json()?).map_err(report)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TestFailure;

    fn snapshot(id: &str, verdict: Verdict, cause: Option<TestFailure>) -> ResultSnapshot {
        ResultSnapshot {
            id: id.to_string(),
            verdict,
            engine_failure: cause.as_ref().map_or(false, TestFailure::is_engine),
            cause,
            disabled_reason: None,
            outcomes: Vec::new(),
        }
    }

    #[test]
    fn summary_counts_verdicts_and_volume() {
        let counter = VolumeCounter::default();
        counter.planned(ProtocolEpoch::Modern, Direction::Server);
        counter.planned(ProtocolEpoch::Modern, Direction::Server);
        counter.executed(ProtocolEpoch::Modern, Direction::Server);
        counter.planned(ProtocolEpoch::Legacy, Direction::Server);

        let tests = vec![
            TestReport::from_snapshot(snapshot("a", Verdict::Succeeded, None), ""),
            TestReport::from_snapshot(snapshot("b", Verdict::Failed, Some(TestFailure::Engine("x".into()))), ""),
            TestReport::from_snapshot(snapshot("c", Verdict::Disabled, None), ""),
        ];
        let report = RunReport::new("t", Direction::Server, Utc::now(), tests, counter.volumes());

        assert_eq!((report.summary.succeeded, report.summary.failed, report.summary.disabled), (1, 1, 1));
        assert_eq!(report.summary.engine_failures, 1);
        assert_eq!(report.summary.total_planned(), 3);
        let modern = report.summary.volume(ProtocolEpoch::Modern, Direction::Server).unwrap();
        assert_eq!((modern.planned, modern.executed), (2, 1));
        assert!(report.has_failures());
        assert_eq!(report.test("b").unwrap().cause.as_deref(), Some("engine failure: x"));
    }

    #[test]
    fn report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport::new("t", Direction::Client, Utc::now(), Vec::new(), Vec::new());
        let path = report.write_to(dir.path()).unwrap();
        let parsed: RunReport = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, report);
    }
}
