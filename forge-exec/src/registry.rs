#![forbid(unsafe_code)]

//! Explicit table of declared tests.
//!
//! A test is data (identifier, epoch, direction, model shape) plus a
//! precondition and a body closure. Collection happens before a run starts;
//! the runner never discovers tests on its own.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use forge_core::{Direction, FeatureReport, ProtocolEpoch};
use forge_derivation::{DerivationScope, DerivationType, ModelType};

use crate::case::CaseHandle;
use crate::error::TestFailure;

/// Rejects a test before anything runs; the error is the human readable reason.
pub type Precondition = Arc<dyn Fn(&FeatureReport) -> Result<(), String> + Send + Sync>;

/// Invoked once per combination with the materialized configuration.
pub type TestBody = Arc<dyn Fn(&mut CaseHandle<'_>) -> Result<(), TestFailure> + Send + Sync>;

/// Derivation shape of a declared test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSpec {
    /// `None` runs the test across both epochs.
    pub epoch: Option<ProtocolEpoch>,
    pub direction: Direction,
    pub model: ModelType,
    pub extensions: Vec<DerivationType>,
    pub limitations: Vec<DerivationType>,
    pub manual: Vec<DerivationType>,
    /// Overrides the configured covering strength.
    pub strength: Option<usize>,
}

impl TestSpec {
    pub fn new(model: ModelType, direction: Direction, epoch: Option<ProtocolEpoch>) -> Self {
        Self {
            epoch,
            direction,
            model,
            extensions: Vec::new(),
            limitations: Vec::new(),
            manual: Vec::new(),
            strength: None,
        }
    }

    pub fn extend(mut self, kind: DerivationType) -> Self {
        self.extensions.push(kind);
        self
    }

    pub fn limit(mut self, kind: DerivationType) -> Self {
        self.limitations.push(kind);
        self
    }

    pub fn manual(mut self, kind: DerivationType) -> Self {
        self.manual.push(kind);
        self
    }

    pub fn strength(mut self, strength: usize) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn scope(&self, default_strength: usize) -> DerivationScope {
        let mut scope = DerivationScope::new(self.model, self.direction, self.epoch)
            .with_strength(self.strength.unwrap_or(default_strength));
        scope.extensions.extend(self.extensions.iter().copied());
        scope.limitations.extend(self.limitations.iter().copied());
        scope.manual.extend(self.manual.iter().copied());
        scope
    }
}

#[derive(Clone)]
pub struct TestDeclaration {
    pub id: String,
    pub description: String,
    pub spec: TestSpec,
    pub precondition: Option<Precondition>,
    pub body: TestBody,
}

impl TestDeclaration {
    pub fn new<F>(id: impl Into<String>, spec: TestSpec, body: F) -> Self
    where
        F: Fn(&mut CaseHandle<'_>) -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        Self { id: id.into(), description: String::new(), spec, precondition: None, body: Arc::new(body) }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn precondition<F>(mut self, check: F) -> Self
    where
        F: Fn(&FeatureReport) -> Result<(), String> + Send + Sync + 'static,
    {
        self.precondition = Some(Arc::new(check));
        self
    }

    /// Reason the test cannot run against `report`, if any.
    pub fn rejection(&self, report: &FeatureReport) -> Option<String> {
        if let Some(epoch) = self.spec.epoch {
            if !report.supports_epoch(epoch) {
                return Some(format!("target does not support the {} epoch", epoch));
            }
        }
        self.precondition.as_ref().and_then(|check| check(report).err())
    }
}

impl fmt::Debug for TestDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDeclaration")
            .field("id", &self.id)
            .field("spec", &self.spec)
            .field("precondition", &self.precondition.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    tests: IndexMap<String, TestDeclaration>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a test. A declaration with an already registered id replaces the
    /// earlier one in place.
    pub fn register(&mut self, declaration: TestDeclaration) -> &mut Self {
        if self.tests.contains_key(&declaration.id) {
            warn!(test = %declaration.id, "replacing duplicate test declaration");
        }
        self.tests.insert(declaration.id.clone(), declaration);
        self
    }

    pub fn get(&self, id: &str) -> Option<&TestDeclaration> {
        self.tests.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestDeclaration> {
        self.tests.values()
    }

    /// Declarations for targets acting in `direction`.
    pub fn for_direction(&self, direction: Direction) -> impl Iterator<Item = &TestDeclaration> {
        self.iter().filter(move |d| d.spec.direction == direction)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::CipherSuite;

    fn noop(_: &mut CaseHandle<'_>) -> Result<(), TestFailure> {
        Ok(())
    }

    #[test]
    fn spec_builds_scope_with_strength_override() {
        let spec = TestSpec::new(ModelType::Generic, Direction::Server, Some(ProtocolEpoch::Modern))
            .extend(DerivationType::AppMessageData)
            .limit(DerivationType::TcpFragmentation)
            .manual(DerivationType::CiphertextBitmask)
            .strength(3);
        let scope = spec.scope(2);
        assert_eq!(scope.strength, 3);
        assert!(scope.extensions.contains(&DerivationType::AppMessageData));
        assert!(scope.is_limited(DerivationType::TcpFragmentation));
        assert!(scope.is_manual(DerivationType::CiphertextBitmask));
        assert_eq!(TestSpec::new(ModelType::Empty, Direction::Client, None).scope(2).strength, 2);
    }

    #[test]
    fn rejection_checks_epoch_then_precondition() {
        let report = FeatureReport::builder("t", Direction::Server)
            .suite(ProtocolEpoch::Legacy, CipherSuite::EcdheRsaWithAes128GcmSha256)
            .build();
        let modern = TestDeclaration::new(
            "modern",
            TestSpec::new(ModelType::Empty, Direction::Server, Some(ProtocolEpoch::Modern)),
            noop,
        );
        assert_eq!(modern.rejection(&report).as_deref(), Some("target does not support the modern epoch"));

        let gated = TestDeclaration::new("gated", TestSpec::new(ModelType::Empty, Direction::Server, None), noop)
            .precondition(|_| Err("needs session tickets".to_string()));
        assert_eq!(gated.rejection(&report).as_deref(), Some("needs session tickets"));
    }

    #[test]
    fn registration_keeps_order_and_replaces_duplicates() {
        let mut registry = TestRegistry::new();
        for id in ["b", "a", "b"] {
            registry.register(TestDeclaration::new(
                id,
                TestSpec::new(ModelType::Empty, Direction::Client, None),
                noop,
            ));
        }
        let ids: Vec<&str> = registry.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(registry.for_direction(Direction::Server).count(), 0);
    }
}
