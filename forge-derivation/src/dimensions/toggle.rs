#![forbid(unsafe_code)]

use forge_core::{DraftConfig, ExtensionType, ProtocolEpoch};

use crate::dimension::{DerivationInputs, Dimension, SideChannel};
use crate::types::{DerivationType, ParameterValue};

/// Include or omit one extension the target supports.
#[derive(Debug)]
pub struct ExtensionToggleDimension {
    kind: DerivationType,
    extension: ExtensionType,
}

impl ExtensionToggleDimension {
    pub fn new(kind: DerivationType, extension: ExtensionType) -> Self {
        Self { kind, extension }
    }
}

impl Dimension for ExtensionToggleDimension {
    fn kind(&self) -> DerivationType {
        self.kind
    }

    fn can_be_modeled(&self, inputs: &DerivationInputs<'_>) -> bool {
        let epoch_fits = !self.extension.legacy_only() || inputs.scope.admits(ProtocolEpoch::Legacy);
        epoch_fits && inputs.report.supports_extension(self.extension)
    }

    fn legal_values(&self, _inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        vec![ParameterValue::Flag(true), ParameterValue::Flag(false)]
    }

    fn apply(&self, value: &ParameterValue, config: &mut DraftConfig, _side: &mut SideChannel) {
        if let Some(enabled) = value.as_flag() {
            let enabled = enabled && !(self.extension.legacy_only() && config.epoch == ProtocolEpoch::Modern);
            config.set_extension(self.extension, enabled);
        }
    }
}

/// Prepend reserved GREASE values to the offered cipher suites.
#[derive(Debug, Default)]
pub struct GreaseDimension;

impl Dimension for GreaseDimension {
    fn kind(&self) -> DerivationType {
        DerivationType::IncludeGreaseCipherSuites
    }

    fn legal_values(&self, _inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        vec![ParameterValue::Flag(false), ParameterValue::Flag(true)]
    }

    fn apply(&self, value: &ParameterValue, config: &mut DraftConfig, _side: &mut SideChannel) {
        if let Some(enabled) = value.as_flag() {
            config.grease_cipher_suites = enabled;
        }
    }
}

/// Application data payload sent once the handshake completed.
#[derive(Debug, Default)]
pub struct AppMessageDataDimension;

impl Dimension for AppMessageDataDimension {
    fn kind(&self) -> DerivationType {
        DerivationType::AppMessageData
    }

    fn legal_values(&self, _inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        vec![
            ParameterValue::Bytes(b"forge".to_vec()),
            ParameterValue::Bytes(Vec::new()),
            ParameterValue::Bytes(vec![0x41; 1500]),
        ]
    }

    fn apply(&self, value: &ParameterValue, config: &mut DraftConfig, _side: &mut SideChannel) {
        if let Some(data) = value.as_bytes() {
            config.application_data = data.to_vec();
        }
    }
}
