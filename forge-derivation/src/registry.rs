#![forbid(unsafe_code)]

//! Registry of dimensions in registration order.

use indexmap::IndexMap;

use forge_core::{ExtensionType, ModificationTarget};

use crate::dimension::Dimension;
use crate::dimensions::*;
use crate::types::DerivationType;

pub struct DimensionRegistry {
    dimensions: IndexMap<DerivationType, Box<dyn Dimension>>,
}

impl DimensionRegistry {
    pub fn empty() -> Self {
        Self { dimensions: IndexMap::new() }
    }

    /// Every shipped dimension. Later registrations apply after earlier ones.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(CipherSuiteDimension));
        registry.register(Box::new(NamedGroupDimension));
        registry.register(Box::new(SignatureSchemeDimension));
        registry.register(Box::new(CertificateDimension));
        registry.register(Box::new(RecordLengthDimension));
        registry.register(Box::new(TcpFragmentationDimension));
        for (kind, extension) in [
            (DerivationType::IncludeEncryptThenMac, ExtensionType::EncryptThenMac),
            (DerivationType::IncludeExtendedMasterSecret, ExtensionType::ExtendedMasterSecret),
            (DerivationType::IncludeSessionTicket, ExtensionType::SessionTicket),
            (DerivationType::IncludeRenegotiationInfo, ExtensionType::RenegotiationInfo),
            (DerivationType::IncludePadding, ExtensionType::Padding),
        ] {
            registry.register(Box::new(ExtensionToggleDimension::new(kind, extension)));
        }
        registry.register(Box::new(GreaseDimension));
        registry.register(Box::new(AppMessageDataDimension));
        for (kind, target) in [
            (DerivationType::CiphertextBitmask, ModificationTarget::Ciphertext),
            (DerivationType::MacBitmask, ModificationTarget::Mac),
            (DerivationType::PaddingBitmask, ModificationTarget::Padding),
        ] {
            registry.register(Box::new(BitmaskDimension::new(kind, target)));
        }
        registry.register(Box::new(BitPositionDimension));
        registry
    }

    /// Register or replace the dimension for its type. Replacing keeps the
    /// original registration position.
    pub fn register(&mut self, dimension: Box<dyn Dimension>) {
        self.dimensions.insert(dimension.kind(), dimension);
    }

    pub fn get(&self, kind: DerivationType) -> Option<&dyn Dimension> {
        self.dimensions.get(&kind).map(|d| &**d)
    }

    pub fn contains(&self, kind: DerivationType) -> bool {
        self.dimensions.contains_key(&kind)
    }

    /// Dimensions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Dimension> {
        self.dimensions.values().map(|d| &**d)
    }

    /// Registration position, used to order model dimensions.
    pub fn position(&self, kind: DerivationType) -> Option<usize> {
        self.dimensions.get_index_of(&kind)
    }
}

impl Default for DimensionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
