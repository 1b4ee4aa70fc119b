#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use forge_core::{DraftConfig, KeyType};

use crate::dimension::{ConditionalConstraint, DerivationInputs, Dimension, SideChannel};
use crate::types::{DerivationType, ParameterValue};

/// Selects the handshake signature scheme.
#[derive(Debug, Default)]
pub struct SignatureSchemeDimension;

impl SignatureSchemeDimension {
    fn usable_key_types(inputs: &DerivationInputs<'_>) -> BTreeSet<KeyType> {
        inputs.usable_certificates().into_iter().map(|c| c.key_type).collect()
    }
}

impl Dimension for SignatureSchemeDimension {
    fn kind(&self) -> DerivationType {
        DerivationType::SignatureScheme
    }

    fn can_be_modeled(&self, inputs: &DerivationInputs<'_>) -> bool {
        !inputs.report.signature_schemes().is_empty()
    }

    fn legal_values(&self, inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        let key_types = Self::usable_key_types(inputs);
        let epochs = inputs.scope.epochs();
        inputs
            .report
            .signature_schemes()
            .iter()
            .copied()
            .filter(|s| epochs.iter().any(|e| s.allowed_in(*e)))
            .filter(|s| key_types.contains(&s.key_type()))
            .map(ParameterValue::SignatureScheme)
            .collect()
    }

    fn apply(&self, value: &ParameterValue, config: &mut DraftConfig, side: &mut SideChannel) {
        if let Some(scheme) = value.as_signature() {
            config.signature_schemes = vec![scheme];
            side.selected_signature = Some(scheme);
        }
    }

    /// The certificate is final only after pass one; advertise certificate
    /// signature schemes that fit it.
    fn post_process(
        &self,
        value: &ParameterValue,
        config: &mut DraftConfig,
        _side: &SideChannel,
        inputs: &DerivationInputs<'_>,
    ) {
        let Some(scheme) = value.as_signature() else { return };
        let Some(cert_key) = config.certificate.as_ref().map(|c| c.key_type) else { return };
        config.certificate_signature_schemes = if scheme.key_type() == cert_key {
            vec![scheme]
        } else {
            inputs
                .report
                .signature_schemes()
                .iter()
                .copied()
                .filter(|s| s.key_type() == cert_key && s.allowed_in(config.epoch))
                .collect()
        };
    }

    fn constraints(&self, _inputs: &DerivationInputs<'_>) -> Vec<ConditionalConstraint> {
        vec![
            ConditionalConstraint::new(
                "signature fits suite",
                vec![DerivationType::CipherSuite, DerivationType::SignatureScheme],
                |values| match (values[0].as_suite(), values[1].as_signature()) {
                    (Some(suite), Some(scheme)) => {
                        suite.accepts_key_type(scheme.key_type()) && scheme.allowed_in(suite.epoch())
                    }
                    _ => false,
                },
            ),
            ConditionalConstraint::new(
                "signature fits certificate",
                vec![DerivationType::Certificate, DerivationType::SignatureScheme],
                |values| match (values[0].as_certificate(), values[1].as_signature()) {
                    (Some(cert), Some(scheme)) => cert.key_type == scheme.key_type(),
                    _ => false,
                },
            ),
        ]
    }
}

