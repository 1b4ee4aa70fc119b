#![forbid(unsafe_code)]

use forge_core::DraftConfig;
use tracing::debug;

use crate::dimension::{DerivationInputs, Dimension, SideChannel};
use crate::types::{DerivationType, ParameterValue};

/// Selects the single cipher suite offered or accepted.
#[derive(Debug, Default)]
pub struct CipherSuiteDimension;

impl Dimension for CipherSuiteDimension {
    fn kind(&self) -> DerivationType {
        DerivationType::CipherSuite
    }

    fn legal_values(&self, inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        inputs.suites_in_scope().into_iter().map(ParameterValue::CipherSuite).collect()
    }

    fn apply(&self, value: &ParameterValue, config: &mut DraftConfig, side: &mut SideChannel) {
        if let Some(suite) = value.as_suite() {
            config.select_suite(suite);
            side.selected_suite = Some(suite);
        }
    }

    /// Swap a default certificate the final suite cannot use for the smallest
    /// usable compatible one, unless a certificate was derived explicitly.
    fn post_process(
        &self,
        value: &ParameterValue,
        config: &mut DraftConfig,
        side: &SideChannel,
        inputs: &DerivationInputs<'_>,
    ) {
        let Some(suite) = value.as_suite() else { return };
        if side.selected_certificate.is_some() {
            return;
        }
        let compatible = config.certificate.as_ref().map_or(false, |c| suite.accepts_key_type(c.key_type));
        if compatible {
            return;
        }
        let replacement = inputs
            .usable_certificates()
            .into_iter()
            .filter(|c| suite.accepts_key_type(c.key_type))
            .min_by_key(|c| (c.key_type, c.key_size))
            .cloned();
        if let Some(cert) = replacement {
            debug!(suite = %suite, certificate = %cert.id, "replacing incompatible default certificate");
            config.certificate = Some(cert);
        }
    }
}
