#![forbid(unsafe_code)]

use forge_core::draft::MAX_RECORD_SIZE;
use forge_core::DraftConfig;

use crate::dimension::{DerivationInputs, Dimension, SideChannel};
use crate::types::{DerivationType, ParameterValue};

/// Reduced record sizes exercised when the target tolerates fragmentation.
const REDUCED_RECORD_SIZES: [u16; 2] = [111, 50];

/// Maximum plaintext record size used by our side of the connection.
#[derive(Debug, Default)]
pub struct RecordLengthDimension;

impl Dimension for RecordLengthDimension {
    fn kind(&self) -> DerivationType {
        DerivationType::RecordLength
    }

    fn legal_values(&self, inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        let mut sizes = vec![MAX_RECORD_SIZE];
        if inputs.report.supports_record_fragmentation() {
            sizes.extend(REDUCED_RECORD_SIZES);
        }
        sizes.into_iter().map(ParameterValue::RecordLength).collect()
    }

    fn apply(&self, value: &ParameterValue, config: &mut DraftConfig, _side: &mut SideChannel) {
        if let Some(size) = value.as_record_length() {
            config.max_record_size = size;
        }
    }
}

/// Split handshake records across TCP segments.
#[derive(Debug, Default)]
pub struct TcpFragmentationDimension;

impl Dimension for TcpFragmentationDimension {
    fn kind(&self) -> DerivationType {
        DerivationType::TcpFragmentation
    }

    fn legal_values(&self, _inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        vec![ParameterValue::Flag(false), ParameterValue::Flag(true)]
    }

    fn apply(&self, value: &ParameterValue, config: &mut DraftConfig, _side: &mut SideChannel) {
        if let Some(enabled) = value.as_flag() {
            config.tcp_fragmentation = enabled;
        }
    }
}
