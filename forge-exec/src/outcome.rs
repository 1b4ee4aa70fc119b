#![forbid(unsafe_code)]

//! Per-interaction outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

use forge_core::{Interaction, InteractionArtifacts, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    ExecutedAsPlanned,
    Deviated,
    TransportError,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::ExecutedAsPlanned => "executed-as-planned",
            RunStatus::Deviated => "deviated",
            RunStatus::TransportError => "transport-error",
        };
        f.write_str(s)
    }
}

/// Result of one interaction, with whatever the driver captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub artifacts: InteractionArtifacts,
    pub error: Option<TransportError>,
    /// Label of the combination that produced the interaction.
    pub combination: String,
}

impl RunOutcome {
    /// Classify the driver's result against the interaction plan. Extra
    /// messages listed as tolerated do not count as a deviation.
    pub fn classify(
        interaction: &Interaction,
        result: Result<InteractionArtifacts, TransportError>,
        combination: impl Into<String>,
    ) -> Self {
        let combination = combination.into();
        match result {
            Ok(artifacts) => {
                let planned = artifacts.plan_completed
                    && artifacts.unexpected.iter().all(|m| interaction.tolerated.contains(m));
                let status = if planned { RunStatus::ExecutedAsPlanned } else { RunStatus::Deviated };
                Self { status, artifacts, error: None, combination }
            }
            Err(error) => Self {
                status: RunStatus::TransportError,
                artifacts: InteractionArtifacts::default(),
                error: Some(error),
                combination,
            },
        }
    }

    pub fn executed_as_planned(&self) -> bool {
        self.status == RunStatus::ExecutedAsPlanned
    }

    /// The interaction reached the target.
    pub fn reached_target(&self) -> bool {
        self.status != RunStatus::TransportError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{InteractionKind, MessageKind};

    fn handshake() -> Interaction {
        Interaction::new(InteractionKind::Handshake, vec![MessageKind::ClientHello, MessageKind::Finished])
    }

    #[test]
    fn tolerated_trailing_messages_are_not_deviations() {
        let artifacts = InteractionArtifacts {
            plan_completed: true,
            unexpected: vec![MessageKind::ApplicationData],
            ..Default::default()
        };
        let strict = RunOutcome::classify(&handshake(), Ok(artifacts.clone()), "a");
        assert_eq!(strict.status, RunStatus::Deviated);

        let lenient = handshake().tolerate(MessageKind::ApplicationData);
        let outcome = RunOutcome::classify(&lenient, Ok(artifacts), "a");
        assert!(outcome.executed_as_planned());
    }

    #[test]
    fn transport_errors_are_recorded() {
        let outcome = RunOutcome::classify(&handshake(), Err(TransportError::ReadTimeout), "b");
        assert_eq!(outcome.status, RunStatus::TransportError);
        assert_eq!(outcome.error, Some(TransportError::ReadTimeout));
        assert!(!outcome.reached_target());
    }
}
