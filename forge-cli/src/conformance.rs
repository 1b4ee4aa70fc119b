#![forbid(unsafe_code)]

//! Built-in conformance catalog.
//!
//! Every check is declared once and registered for both directions; the
//! runner keeps the ones matching the configured target role.

use forge_core::{Direction, ExtensionType, InteractionKind, MessageKind, ModificationTarget, ProtocolEpoch};
use forge_derivation::{DerivationType, ModelType};
use forge_exec::{CaseHandle, RunOutcome, TestDeclaration, TestFailure, TestRegistry, TestSpec};

fn completes(outcome: &RunOutcome) -> Result<(), TestFailure> {
    if outcome.executed_as_planned() {
        return Ok(());
    }
    let detail = match (&outcome.error, outcome.artifacts.alert) {
        (Some(error), _) => error.to_string(),
        (None, Some(alert)) => format!("alert {}", alert),
        (None, None) => "message flow deviated".to_string(),
    };
    Err(TestFailure::assertion(format!("handshake did not complete: {}", detail)))
}

fn rejects(outcome: &RunOutcome) -> Result<(), TestFailure> {
    if outcome.executed_as_planned() || !outcome.artifacts.received_message(MessageKind::Alert) {
        return Err(TestFailure::assertion("tampered record was not rejected with an alert"));
    }
    Ok(())
}

fn handshake(case: &mut CaseHandle<'_>) -> Result<(), TestFailure> {
    let interaction = case.interaction(InteractionKind::Handshake);
    case.execute(interaction, completes)
}

fn tampered_handshake(case: &mut CaseHandle<'_>) -> Result<(), TestFailure> {
    let interaction = case.interaction(InteractionKind::Handshake);
    case.execute(interaction, rejects)
}

fn declarations(direction: Direction) -> Vec<TestDeclaration> {
    let id = |name: &str| format!("{}/{}", direction, name);
    vec![
        TestDeclaration::new(id("handshake/parameters"), TestSpec::new(ModelType::Generic, direction, None), handshake)
            .describe("handshakes complete across the pairwise parameter space"),
        TestDeclaration::new(
            id("handshake/certificates"),
            TestSpec::new(ModelType::Certificate, direction, None),
            handshake,
        )
        .describe("every usable certificate and signature scheme is accepted"),
        TestDeclaration::new(
            id("record/fragmented"),
            TestSpec::new(ModelType::Empty, direction, None)
                .extend(DerivationType::CipherSuite)
                .extend(DerivationType::RecordLength),
            handshake,
        )
        .describe("reduced record sizes are reassembled")
        .precondition(|report| {
            if report.supports_record_fragmentation() {
                Ok(())
            } else {
                Err("target does not accept fragmented records".into())
            }
        }),
        TestDeclaration::new(
            id("record/mac-bit-flip"),
            TestSpec::new(ModelType::Empty, direction, Some(ProtocolEpoch::Legacy))
                .extend(DerivationType::CipherSuite)
                .extend(DerivationType::MacBitmask)
                .limit(DerivationType::BitPosition),
            tampered_handshake,
        )
        .describe("a single flipped MAC bit aborts the connection"),
        TestDeclaration::new(
            id("record/ciphertext-bit-flip"),
            TestSpec::new(ModelType::Empty, direction, Some(ProtocolEpoch::Modern))
                .extend(DerivationType::CiphertextBitmask)
                .strength(1),
            tampered_handshake,
        )
        .describe("a single flipped ciphertext bit aborts the connection"),
        TestDeclaration::new(
            id("record/padding-bit-flip"),
            TestSpec::new(ModelType::Empty, direction, Some(ProtocolEpoch::Legacy))
                .extend(DerivationType::CipherSuite)
                .extend(DerivationType::PaddingBitmask)
                .manual(DerivationType::PaddingBitmask)
                .strength(1),
            |case| {
                let Some(mask) = case.container().bitmask(DerivationType::PaddingBitmask) else {
                    return Err(TestFailure::Engine("padding mask missing from combination".into()));
                };
                case.config_mut().modifications.insert(ModificationTarget::Padding, mask);
                tampered_handshake(case)
            },
        )
        .describe("corrupted block cipher padding aborts the connection"),
        TestDeclaration::new(
            id("extensions/encrypt-then-mac"),
            TestSpec::new(ModelType::Empty, direction, Some(ProtocolEpoch::Legacy))
                .extend(DerivationType::CipherSuite)
                .extend(DerivationType::IncludeEncryptThenMac),
            handshake,
        )
        .describe("encrypt-then-mac negotiation does not break the handshake")
        .precondition(|report| {
            if report.supports_extension(ExtensionType::EncryptThenMac) {
                Ok(())
            } else {
                Err("target does not negotiate encrypt-then-mac".into())
            }
        }),
    ]
}

pub fn registry() -> TestRegistry {
    let mut registry = TestRegistry::new();
    for direction in [Direction::Server, Direction::Client] {
        for declaration in declarations(direction) {
            registry.register(declaration);
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedTarget;
    use forge_core::ForgeConfig;
    use forge_exec::{RunContext, TestRunner, Verdict};
    use std::sync::Arc;

    #[test]
    fn registers_each_check_per_direction() {
        let registry = registry();
        assert_eq!(registry.for_direction(Direction::Server).count(), registry.len() / 2);
        assert!(registry.get("client/record/mac-bit-flip").is_some());
    }

    #[test]
    fn reference_target_passes_the_catalog() {
        let _ = tracing_subscriber::fmt::try_init();
        let target = Arc::new(SimulatedTarget::reference("sim:4433", Direction::Server));
        let settings = ForgeConfig { parallel_handshakes: 2, ..ForgeConfig::default() };
        let context = RunContext::new(settings, target.profile().clone(), target.clone());

        let run = TestRunner::new(context).run(&registry()).unwrap();

        assert!(!run.has_failures(), "{:#?}", run.tests);
        let etm = run.test("server/extensions/encrypt-then-mac").unwrap();
        assert_eq!(etm.verdict, Verdict::Disabled);
        let padding = run.test("server/record/padding-bit-flip").unwrap();
        assert_eq!(padding.verdict, Verdict::Succeeded);
        assert!(padding.outcomes.iter().all(|o| o.alert == Some(20)));
        assert!(run.summary.total_executed() > 0);
    }
}
