#![forbid(unsafe_code)]

use forge_core::{Direction, DraftConfig};

use crate::dimension::{ConditionalConstraint, DerivationInputs, Dimension, SideChannel};
use crate::types::{DerivationType, ParameterValue};

/// Selects the certificate presented to a client target.
#[derive(Debug, Default)]
pub struct CertificateDimension;

impl Dimension for CertificateDimension {
    fn kind(&self) -> DerivationType {
        DerivationType::Certificate
    }

    fn can_be_modeled(&self, inputs: &DerivationInputs<'_>) -> bool {
        inputs.scope.direction == Direction::Client
    }

    /// Usable certificates whose key type authenticates at least one suite in scope.
    fn legal_values(&self, inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        let suites = inputs.suites_in_scope();
        inputs
            .usable_certificates()
            .into_iter()
            .filter(|cert| suites.iter().any(|s| s.accepts_key_type(cert.key_type)))
            .cloned()
            .map(ParameterValue::Certificate)
            .collect()
    }

    fn apply(&self, value: &ParameterValue, config: &mut DraftConfig, side: &mut SideChannel) {
        if let Some(cert) = value.as_certificate() {
            config.certificate = Some(cert.clone());
            side.selected_certificate = Some(cert.clone());
        }
    }

    fn constraints(&self, _inputs: &DerivationInputs<'_>) -> Vec<ConditionalConstraint> {
        vec![ConditionalConstraint::new(
            "certificate fits suite",
            vec![DerivationType::CipherSuite, DerivationType::Certificate],
            |values| match (values[0].as_suite(), values[1].as_certificate()) {
                (Some(suite), Some(cert)) => suite.accepts_key_type(cert.key_type),
                _ => false,
            },
        )]
    }
}
