#![forbid(unsafe_code)]

use forge_core::{CipherKind, DraftConfig, ModificationTarget};

use crate::container::bitmask;
use crate::dimension::{ConditionalConstraint, DerivationInputs, Dimension, SideChannel};
use crate::types::{DerivationType, ParameterValue};

const BLOCK_SIZE: usize = 16;

/// Byte index of a single-bit flip in record ciphertext, MAC or padding.
///
/// The bit within the byte comes from the shared [`BitPositionDimension`], so
/// the mask can only be rebuilt in the second pass.
#[derive(Debug)]
pub struct BitmaskDimension {
    kind: DerivationType,
    target: ModificationTarget,
}

impl BitmaskDimension {
    pub fn new(kind: DerivationType, target: ModificationTarget) -> Self {
        Self { kind, target }
    }

    fn length(&self, inputs: &DerivationInputs<'_>) -> usize {
        let suites = inputs.suites_in_scope();
        match self.target {
            ModificationTarget::Ciphertext | ModificationTarget::Padding => BLOCK_SIZE,
            ModificationTarget::Mac => suites.iter().map(|s| s.mac_len()).max().unwrap_or(BLOCK_SIZE),
        }
    }
}

impl Dimension for BitmaskDimension {
    fn kind(&self) -> DerivationType {
        self.kind
    }

    /// Padding only exists for block ciphers.
    fn can_be_modeled(&self, inputs: &DerivationInputs<'_>) -> bool {
        match self.target {
            ModificationTarget::Padding => {
                inputs.suites_in_scope().iter().any(|s| s.cipher_kind() == CipherKind::Block)
            }
            _ => true,
        }
    }

    fn legal_values(&self, inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        (0..self.length(inputs)).map(ParameterValue::ByteIndex).collect()
    }

    fn apply(&self, value: &ParameterValue, _config: &mut DraftConfig, side: &mut SideChannel) {
        if let Some(index) = value.as_byte_index() {
            side.bitmask_bytes.insert(self.kind, index);
        }
    }

    fn post_process(
        &self,
        value: &ParameterValue,
        config: &mut DraftConfig,
        side: &SideChannel,
        _inputs: &DerivationInputs<'_>,
    ) {
        if let Some(index) = value.as_byte_index() {
            let bit = side.bit_index.unwrap_or(0);
            config.modifications.insert(self.target, bitmask(index, bit));
        }
    }

    /// MAC lengths differ per suite; the byte has to fall inside the selected one.
    fn constraints(&self, _inputs: &DerivationInputs<'_>) -> Vec<ConditionalConstraint> {
        if self.target != ModificationTarget::Mac {
            return Vec::new();
        }
        vec![ConditionalConstraint::new(
            "mac byte within suite mac",
            vec![DerivationType::CipherSuite, self.kind],
            |values| match (values[0].as_suite(), values[1].as_byte_index()) {
                (Some(suite), Some(index)) => index < suite.mac_len(),
                _ => false,
            },
        )]
    }
}

/// Bit index (0-7) within the byte chosen by a bitmask dimension.
#[derive(Debug, Default)]
pub struct BitPositionDimension;

impl Dimension for BitPositionDimension {
    fn kind(&self) -> DerivationType {
        DerivationType::BitPosition
    }

    fn legal_values(&self, _inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        (0..8u8).map(ParameterValue::BitIndex).collect()
    }

    fn apply(&self, value: &ParameterValue, _config: &mut DraftConfig, side: &mut SideChannel) {
        if let Some(bit) = value.as_bit_index() {
            side.bit_index = Some(bit);
        }
    }
}
