#![forbid(unsafe_code)]

//! Derivation scopes and scope resolution.
//!
//! A type is in play for a test iff it belongs to the base set of the test's
//! model shape or was explicitly added, and it was not explicitly removed.
//! Removal always wins over addition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use forge_core::{Direction, ProtocolEpoch};

use crate::types::DerivationType;

/// Shape of the combinatorial model a test starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    /// No dimension; the test runs a single fixed configuration unless it adds types.
    Empty,
    Generic,
    /// Generic plus certificate and signature dimensions.
    Certificate,
    /// Reduced model for tests that manipulate length fields.
    LengthField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationScope {
    pub model_type: ModelType,
    pub extensions: BTreeSet<DerivationType>,
    pub limitations: BTreeSet<DerivationType>,
    /// Types the test body applies itself.
    pub manual: BTreeSet<DerivationType>,
    pub strength: usize,
    pub direction: Direction,
    /// Epoch gate; `None` admits values of both epochs.
    pub epoch: Option<ProtocolEpoch>,
}

impl DerivationScope {
    pub fn new(model_type: ModelType, direction: Direction, epoch: Option<ProtocolEpoch>) -> Self {
        Self {
            model_type,
            extensions: BTreeSet::new(),
            limitations: BTreeSet::new(),
            manual: BTreeSet::new(),
            strength: 2,
            direction,
            epoch,
        }
    }

    pub fn with_extension(mut self, kind: DerivationType) -> Self {
        self.extensions.insert(kind);
        self
    }

    pub fn with_limitation(mut self, kind: DerivationType) -> Self {
        self.limitations.insert(kind);
        self
    }

    pub fn with_manual(mut self, kind: DerivationType) -> Self {
        self.manual.insert(kind);
        self
    }

    pub fn with_strength(mut self, strength: usize) -> Self {
        self.strength = strength;
        self
    }

    /// Epochs whose values are admissible under this scope.
    pub fn epochs(&self) -> Vec<ProtocolEpoch> {
        match self.epoch {
            Some(epoch) => vec![epoch],
            None => ProtocolEpoch::ALL.to_vec(),
        }
    }

    pub fn admits(&self, epoch: ProtocolEpoch) -> bool {
        self.epoch.map_or(true, |e| e == epoch)
    }

    pub fn is_manual(&self, kind: DerivationType) -> bool {
        self.manual.contains(&kind)
    }

    pub fn is_limited(&self, kind: DerivationType) -> bool {
        self.limitations.contains(&kind)
    }
}

/// Source of the base type set per model shape.
pub trait ModelRegistry: Send + Sync {
    fn base_types(&self, scope: &DerivationScope) -> Vec<DerivationType>;
}

/// Default base sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardModelRegistry;

impl StandardModelRegistry {
    fn generic(scope: &DerivationScope) -> Vec<DerivationType> {
        let mut types = vec![
            DerivationType::CipherSuite,
            DerivationType::NamedGroup,
            DerivationType::RecordLength,
            DerivationType::TcpFragmentation,
            DerivationType::IncludePadding,
            DerivationType::IncludeGreaseCipherSuites,
        ];
        if scope.admits(ProtocolEpoch::Legacy) {
            types.extend([
                DerivationType::IncludeEncryptThenMac,
                DerivationType::IncludeExtendedMasterSecret,
                DerivationType::IncludeSessionTicket,
                DerivationType::IncludeRenegotiationInfo,
            ]);
        }
        types
    }
}

impl ModelRegistry for StandardModelRegistry {
    fn base_types(&self, scope: &DerivationScope) -> Vec<DerivationType> {
        match scope.model_type {
            ModelType::Empty => Vec::new(),
            ModelType::Generic => Self::generic(scope),
            ModelType::Certificate => {
                let mut types = Self::generic(scope);
                types.extend([DerivationType::Certificate, DerivationType::SignatureScheme]);
                types
            }
            ModelType::LengthField => vec![DerivationType::CipherSuite, DerivationType::NamedGroup],
        }
    }
}

/// Types in play for `scope`, in registration order, without duplicates.
pub fn resolve_types(scope: &DerivationScope, registry: &dyn ModelRegistry) -> Vec<DerivationType> {
    let included: BTreeSet<DerivationType> = registry
        .base_types(scope)
        .into_iter()
        .chain(scope.extensions.iter().copied())
        .filter(|kind| !scope.limitations.contains(kind))
        .collect();
    included.into_iter().collect()
}
