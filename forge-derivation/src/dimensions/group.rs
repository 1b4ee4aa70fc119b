#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use forge_core::{DraftConfig, KeyExchange, NamedGroup, ProtocolEpoch};

use crate::dimension::{ConditionalConstraint, DerivationInputs, Dimension, SideChannel};
use crate::types::{DerivationType, ParameterValue};

/// Selects the key exchange group.
#[derive(Debug, Default)]
pub struct NamedGroupDimension;

impl NamedGroupDimension {
    fn groups(inputs: &DerivationInputs<'_>) -> BTreeSet<NamedGroup> {
        inputs
            .scope
            .epochs()
            .into_iter()
            .flat_map(|epoch| inputs.report.groups(epoch).iter().copied())
            .collect()
    }
}

impl Dimension for NamedGroupDimension {
    fn kind(&self) -> DerivationType {
        DerivationType::NamedGroup
    }

    /// Legacy-only scopes need at least one suite that negotiates a group.
    fn can_be_modeled(&self, inputs: &DerivationInputs<'_>) -> bool {
        inputs.suites_in_scope().iter().any(|s| s.uses_named_group()) && !Self::groups(inputs).is_empty()
    }

    fn legal_values(&self, inputs: &DerivationInputs<'_>) -> Vec<ParameterValue> {
        Self::groups(inputs).into_iter().map(ParameterValue::NamedGroup).collect()
    }

    fn apply(&self, value: &ParameterValue, config: &mut DraftConfig, side: &mut SideChannel) {
        if let Some(group) = value.as_group() {
            config.select_group(group);
            side.selected_group = Some(group);
        }
    }

    /// Suites that do not negotiate a group only pair with the first group, so
    /// the covering array does not spend rows on irrelevant pairs.
    fn constraints(&self, inputs: &DerivationInputs<'_>) -> Vec<ConditionalConstraint> {
        let groups = Self::groups(inputs);
        let Some(first) = groups.iter().next().copied() else { return Vec::new() };
        let legacy = inputs.report.groups(ProtocolEpoch::Legacy).clone();
        let modern = inputs.report.groups(ProtocolEpoch::Modern).clone();
        vec![ConditionalConstraint::new(
            "group matches key exchange",
            vec![DerivationType::CipherSuite, DerivationType::NamedGroup],
            move |values| {
                let (Some(suite), Some(group)) = (values[0].as_suite(), values[1].as_group()) else {
                    return false;
                };
                match suite.key_exchange() {
                    KeyExchange::Rsa => group == first,
                    KeyExchange::Dhe => group == first || (group.is_finite_field() && legacy.contains(&group)),
                    KeyExchange::Ecdhe => group.is_elliptic() && legacy.contains(&group),
                    KeyExchange::Negotiated => modern.contains(&group),
                }
            },
        )]
    }
}
