#![forbid(unsafe_code)]

//! Materialization of one combination into a draft configuration.
//!
//! Application runs in two passes over the registry order. The first pass lets
//! each dimension make its primary edit and record what it chose in a
//! [`SideChannel`]; the second pass runs fix-ups that depend on the final
//! values of other dimensions. Types a test applies itself are skipped in
//! both passes.

use tracing::trace;

use forge_core::{strategy_for, DraftConfig, ForgeConfig, ProtocolDriver, ProtocolEpoch};

use crate::dimension::{DerivationInputs, SideChannel};
use crate::model::Combination;
use crate::registry::DimensionRegistry;
use crate::scope::DerivationScope;
use crate::types::{DerivationParameter, DerivationType, ParameterValue};

/// XOR mask of `byte_index + 1` bytes with only bit `bit_index` of the last
/// byte set.
pub fn bitmask(byte_index: usize, bit_index: u8) -> Vec<u8> {
    let mut mask = vec![0u8; byte_index + 1];
    mask[byte_index] = 1u8 << (bit_index % 8);
    mask
}

/// The parameters of one combination and the scope they were derived under.
#[derive(Debug, Clone)]
pub struct DerivationContainer {
    combination: Combination,
    scope: DerivationScope,
}

impl DerivationContainer {
    pub fn new(combination: Combination, scope: DerivationScope) -> Self {
        Self { combination, scope }
    }

    pub fn combination(&self) -> &Combination {
        &self.combination
    }

    pub fn scope(&self) -> &DerivationScope {
        &self.scope
    }

    pub fn get(&self, kind: DerivationType) -> Option<&DerivationParameter> {
        self.combination.get(kind)
    }

    pub fn value(&self, kind: DerivationType) -> Option<&ParameterValue> {
        self.combination.value(kind)
    }

    /// Epoch of the selected suite, falling back to the scope's gate.
    pub fn epoch(&self) -> ProtocolEpoch {
        self.value(DerivationType::CipherSuite)
            .and_then(ParameterValue::as_suite)
            .map(|suite| suite.epoch())
            .or(self.scope.epoch)
            .unwrap_or(ProtocolEpoch::Legacy)
    }

    /// Mask for a bitmask type, combining its byte index with the shared bit
    /// position. Test bodies that mark a bitmask type as manual read it here.
    pub fn bitmask(&self, kind: DerivationType) -> Option<Vec<u8>> {
        if !kind.is_bitmask() {
            return None;
        }
        let byte = self.value(kind)?.as_byte_index()?;
        let bit = self
            .value(DerivationType::BitPosition)
            .and_then(ParameterValue::as_bit_index)
            .unwrap_or(0);
        Some(bitmask(byte, bit))
    }

    /// Run both application passes on `config`.
    pub fn apply_to(&self, config: &mut DraftConfig, registry: &DimensionRegistry, inputs: &DerivationInputs<'_>) {
        let applied: Vec<_> = registry
            .iter()
            .filter(|dimension| !self.scope.is_manual(dimension.kind()) && dimension.auto_applies(&self.scope))
            .filter_map(|dimension| self.value(dimension.kind()).map(|value| (dimension, value)))
            .collect();

        let mut side = SideChannel::default();
        for (dimension, value) in &applied {
            trace!(kind = %dimension.kind(), value = %value, "apply");
            dimension.apply(value, config, &mut side);
        }
        for (dimension, value) in &applied {
            dimension.post_process(value, config, &side, inputs);
        }
    }

    /// Driver base configuration, shaped by the epoch strategy, with the
    /// combination applied.
    pub fn build_config(
        &self,
        driver: &dyn ProtocolDriver,
        registry: &DimensionRegistry,
        inputs: &DerivationInputs<'_>,
        settings: &ForgeConfig,
    ) -> DraftConfig {
        let strategy = strategy_for(self.epoch());
        let mut config = strategy(driver.build_config(self.scope.direction));
        config.connect_timeout = settings.connect_timeout();
        config.read_timeout = settings.read_timeout();
        self.apply_to(&mut config, registry, inputs);
        config
    }

    pub fn label(&self) -> String {
        if self.combination.is_empty() {
            "<default>".to_string()
        } else {
            self.combination.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bitmask_sets_single_bit_of_last_byte() {
        assert_eq!(bitmask(2, 3), vec![0, 0, 8]);
        assert_eq!(bitmask(0, 0), vec![1]);
        assert_eq!(bitmask(1, 7), vec![0, 0x80]);
    }

    proptest! {
        #[test]
        fn bitmask_has_exactly_one_bit(byte in 0usize..64, bit in 0u8..8) {
            let mask = bitmask(byte, bit);
            prop_assert_eq!(mask.len(), byte + 1);
            prop_assert_eq!(mask.iter().map(|b| b.count_ones()).sum::<u32>(), 1);
            prop_assert_eq!(mask[byte], 1u8 << bit);
        }
    }
}
