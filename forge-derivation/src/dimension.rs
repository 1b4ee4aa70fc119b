#![forbid(unsafe_code)]

//! Behavior attached to a configuration dimension.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use forge_core::{CertificateSpec, CipherSuite, DraftConfig, FeatureReport, NamedGroup, SignatureScheme};

use crate::scope::DerivationScope;
use crate::types::{DerivationType, ParameterValue};

/// Read-only inputs every dimension resolves against.
#[derive(Debug, Clone, Copy)]
pub struct DerivationInputs<'a> {
    pub report: &'a FeatureReport,
    pub scope: &'a DerivationScope,
    /// Certificates the driver can present.
    pub certificates: &'a [CertificateSpec],
}

impl<'a> DerivationInputs<'a> {
    pub fn new(report: &'a FeatureReport, scope: &'a DerivationScope, certificates: &'a [CertificateSpec]) -> Self {
        Self { report, scope, certificates }
    }

    /// Supported suites of every epoch the scope admits.
    pub fn suites_in_scope(&self) -> Vec<CipherSuite> {
        self.scope
            .epochs()
            .into_iter()
            .flat_map(|epoch| self.report.suites(epoch).iter().copied())
            .collect()
    }

    /// Certificates at or above the minimum size the target accepts for their
    /// key type. When probing recorded no key sizes every certificate is usable.
    pub fn usable_certificates(&self) -> Vec<&'a CertificateSpec> {
        let sizes = self.report.min_key_sizes();
        self.certificates
            .iter()
            .filter(|cert| {
                if sizes.is_empty() {
                    return true;
                }
                sizes.get(&cert.key_type).map_or(false, |min| cert.key_size >= *min)
            })
            .collect()
    }
}

/// Values selected during the first pass, consumed by the second.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideChannel {
    pub selected_suite: Option<CipherSuite>,
    pub selected_group: Option<NamedGroup>,
    pub selected_signature: Option<SignatureScheme>,
    pub selected_certificate: Option<CertificateSpec>,
    /// Byte index per bitmask dimension.
    pub bitmask_bytes: BTreeMap<DerivationType, usize>,
    pub bit_index: Option<u8>,
}

type Predicate = dyn Fn(&[&ParameterValue]) -> bool + Send + Sync;

/// Exclusion rule over the values of several dimensions.
///
/// The predicate receives the selected values in the order of `referenced`
/// and returns `true` when the combination is allowed.
#[derive(Clone)]
pub struct ConditionalConstraint {
    name: String,
    referenced: Vec<DerivationType>,
    predicate: Arc<Predicate>,
}

impl ConditionalConstraint {
    pub fn new<F>(name: impl Into<String>, referenced: Vec<DerivationType>, predicate: F) -> Self
    where
        F: Fn(&[&ParameterValue]) -> bool + Send + Sync + 'static,
    {
        Self { name: name.into(), referenced, predicate: Arc::new(predicate) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn referenced(&self) -> &[DerivationType] {
        &self.referenced
    }

    pub fn allows(&self, values: &[&ParameterValue]) -> bool {
        (self.predicate)(values)
    }
}

impl fmt::Debug for ConditionalConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalConstraint")
            .field("name", &self.name)
            .field("referenced", &self.referenced)
            .finish()
    }
}

/// Enumeration, application and constraint logic of one dimension.
pub trait Dimension: Send + Sync {
    fn kind(&self) -> DerivationType;

    /// Whether the dimension makes sense for this target and scope at all.
    fn can_be_modeled(&self, _inputs: &DerivationInputs<'_>) -> bool {
        true
    }

    fn legal_values(&self, inputs: &DerivationInputs<'_>) -> Vec<ParameterValue>;

    /// Whether the container applies this dimension without help from the test body.
    fn auto_applies(&self, _scope: &DerivationScope) -> bool {
        true
    }

    /// First pass: primary edit of the draft configuration.
    fn apply(&self, value: &ParameterValue, config: &mut DraftConfig, side: &mut SideChannel);

    /// Second pass, after every dimension's primary edit has landed.
    fn post_process(
        &self,
        _value: &ParameterValue,
        _config: &mut DraftConfig,
        _side: &SideChannel,
        _inputs: &DerivationInputs<'_>,
    ) {
    }

    fn constraints(&self, _inputs: &DerivationInputs<'_>) -> Vec<ConditionalConstraint> {
        Vec::new()
    }
}
