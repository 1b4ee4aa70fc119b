#![forbid(unsafe_code)]

//! Combinatorial model construction.
//!
//! Types resolved for a scope are asked whether they can be modeled at all and
//! for their legal values. Single-valued types become static assignments that
//! are part of every combination but never reach the covering array search.
//! A model with exactly one remaining dimension iterates its values directly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

use crate::covering::{CoveringArrayGenerator, IndexedConstraint};
use crate::dimension::{ConditionalConstraint, DerivationInputs};
use crate::error::ModelError;
use crate::registry::DimensionRegistry;
use crate::scope::{resolve_types, DerivationScope, ModelRegistry};
use crate::types::{DerivationParameter, DerivationType, ParameterValue};

/// One parameter per included type for a single interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    parameters: Vec<DerivationParameter>,
}

impl Combination {
    /// Later parameters replace earlier ones of the same type.
    pub fn new(parameters: impl IntoIterator<Item = DerivationParameter>) -> Self {
        let by_kind: BTreeMap<DerivationType, DerivationParameter> =
            parameters.into_iter().map(|p| (p.kind(), p)).collect();
        Self { parameters: by_kind.into_values().collect() }
    }

    pub fn parameters(&self) -> &[DerivationParameter] {
        &self.parameters
    }

    pub fn get(&self, kind: DerivationType) -> Option<&DerivationParameter> {
        self.parameters.iter().find(|p| p.kind() == kind)
    }

    pub fn value(&self, kind: DerivationType) -> Option<&ParameterValue> {
        self.get(kind).map(DerivationParameter::value)
    }

    pub fn kinds(&self) -> impl Iterator<Item = DerivationType> + '_ {
        self.parameters.iter().map(DerivationParameter::kind)
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.parameters.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}

/// Resolved, constrained model of one test.
#[derive(Debug, Clone)]
pub struct DerivationModel {
    scope: DerivationScope,
    statics: Vec<DerivationParameter>,
    dimensions: Vec<(DerivationType, Vec<ParameterValue>)>,
    constraints: Vec<ConditionalConstraint>,
    dropped: Vec<DerivationType>,
}

enum Slot<'a> {
    Dimension(usize),
    Static(&'a ParameterValue),
}

impl DerivationModel {
    pub fn scope(&self) -> &DerivationScope {
        &self.scope
    }

    pub fn static_assignments(&self) -> &[DerivationParameter] {
        &self.statics
    }

    /// Types that take part in the combinatorial search.
    pub fn dimension_types(&self) -> Vec<DerivationType> {
        self.dimensions.iter().map(|(kind, _)| *kind).collect()
    }

    /// Every type present in the combinations, static or not.
    pub fn resolved_types(&self) -> BTreeSet<DerivationType> {
        self.statics.iter().map(DerivationParameter::kind).chain(self.dimension_types()).collect()
    }

    /// Types removed because they could not be modeled for this target.
    pub fn dropped_types(&self) -> &[DerivationType] {
        &self.dropped
    }

    pub fn constraints(&self) -> &[ConditionalConstraint] {
        &self.constraints
    }

    /// Exactly one dimension: the covering array algorithm is skipped.
    pub fn is_simple(&self) -> bool {
        self.dimensions.len() == 1
    }

    fn static_value(&self, kind: DerivationType) -> Option<&ParameterValue> {
        self.statics.iter().find(|p| p.kind() == kind).map(DerivationParameter::value)
    }

    fn dimension_index(&self, kind: DerivationType) -> Option<usize> {
        self.dimensions.iter().position(|(k, _)| *k == kind)
    }

    fn slots(&self, constraint: &ConditionalConstraint) -> Vec<Slot<'_>> {
        constraint
            .referenced()
            .iter()
            .filter_map(|kind| match self.dimension_index(*kind) {
                Some(index) => Some(Slot::Dimension(index)),
                None => self.static_value(*kind).map(Slot::Static),
            })
            .collect()
    }

    fn combination(&self, row: &[usize]) -> Combination {
        let varying = self
            .dimensions
            .iter()
            .zip(row)
            .map(|((kind, values), &v)| DerivationParameter::new(*kind, values[v].clone()));
        Combination::new(self.statics.iter().cloned().chain(varying))
    }

    /// Covering set of combinations at the scope's strength.
    pub fn combinations(&self) -> Result<Vec<Combination>, ModelError> {
        for constraint in &self.constraints {
            let slots = self.slots(constraint);
            if slots.iter().all(|s| matches!(s, Slot::Static(_))) {
                let values: Vec<&ParameterValue> = slots
                    .iter()
                    .filter_map(|s| match s {
                        Slot::Static(v) => Some(*v),
                        Slot::Dimension(_) => None,
                    })
                    .collect();
                if !constraint.allows(&values) {
                    debug!(constraint = constraint.name(), "static assignments violate constraint");
                    return Err(ModelError::Unsatisfiable);
                }
            }
        }

        if self.dimensions.is_empty() {
            return Ok(vec![Combination::new(self.statics.iter().cloned())]);
        }

        let sizes: Vec<usize> = self.dimensions.iter().map(|(_, values)| values.len()).collect();
        let mut generator = CoveringArrayGenerator::new(sizes, self.scope.strength);
        for constraint in &self.constraints {
            let slots = self.slots(constraint);
            let params: Vec<usize> = slots
                .iter()
                .filter_map(|s| match s {
                    Slot::Dimension(index) => Some(*index),
                    Slot::Static(_) => None,
                })
                .collect();
            if params.is_empty() {
                continue;
            }
            let dimensions = &self.dimensions;
            generator = generator.with_constraint(IndexedConstraint::new(params, move |row_values| {
                let mut next = 0;
                let selected: Vec<&ParameterValue> = slots
                    .iter()
                    .map(|slot| match slot {
                        Slot::Dimension(index) => {
                            let value = &dimensions[*index].1[row_values[next]];
                            next += 1;
                            value
                        }
                        Slot::Static(value) => *value,
                    })
                    .collect();
                constraint.allows(&selected)
            }));
        }

        let rows = if self.is_simple() {
            (0..self.dimensions[0].1.len())
                .map(|v| vec![v])
                .filter(|row| generator.accepts(row))
                .collect::<Vec<_>>()
        } else {
            generator.generate()
        };
        if rows.is_empty() {
            return Err(ModelError::Unsatisfiable);
        }
        debug!(
            dimensions = self.dimensions.len(),
            statics = self.statics.len(),
            combinations = rows.len(),
            simple = self.is_simple(),
            "derivation model expanded"
        );
        Ok(rows.iter().map(|row| self.combination(row)).collect())
    }
}

/// Builds a [`DerivationModel`] from a scope and a feature report.
pub struct ModelBuilder<'a> {
    dimensions: &'a DimensionRegistry,
    models: &'a dyn ModelRegistry,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(dimensions: &'a DimensionRegistry, models: &'a dyn ModelRegistry) -> Self {
        Self { dimensions, models }
    }

    pub fn build(&self, inputs: &DerivationInputs<'_>) -> Result<DerivationModel, ModelError> {
        let scope = inputs.scope;
        if scope.strength == 0 {
            return Err(ModelError::InvalidStrength);
        }
        let mut included: BTreeSet<DerivationType> = resolve_types(scope, self.models).into_iter().collect();
        if let Some(missing) = included.iter().find(|k| !self.dimensions.contains(**k)) {
            return Err(ModelError::Unregistered(*missing));
        }

        let mut statics = Vec::new();
        let mut dimensions = Vec::new();
        let mut dropped = Vec::new();
        // Children are resolved after every parent had the chance to add them,
        // whatever their registration position.
        let (parents, children): (Vec<_>, Vec<_>) = self.dimensions.iter().partition(|d| !d.kind().is_child());
        for dimension in parents.into_iter().chain(children) {
            let kind = dimension.kind();
            if !included.contains(&kind) {
                continue;
            }
            if !dimension.can_be_modeled(inputs) {
                debug!(kind = %kind, "dimension cannot be modeled for this target");
                dropped.push(kind);
                continue;
            }
            let mut values = dimension.legal_values(inputs);
            match values.len() {
                0 => return Err(ModelError::EmptyDomain(kind)),
                1 => statics.push(DerivationParameter::new(kind, values.remove(0))),
                _ => dimensions.push((kind, values)),
            }
            if let Some(child) = kind.child() {
                if !scope.is_limited(child) {
                    if !self.dimensions.contains(child) {
                        return Err(ModelError::Unregistered(child));
                    }
                    included.insert(child);
                }
            }
        }

        dimensions.sort_by_key(|(kind, _)| self.dimensions.position(*kind));
        statics.sort_by_key(|p| self.dimensions.position(p.kind()));

        let survivors: BTreeSet<DerivationType> =
            statics.iter().map(DerivationParameter::kind).chain(dimensions.iter().map(|(k, _)| *k)).collect();
        let mut constraints = Vec::new();
        for kind in &survivors {
            let Some(dimension) = self.dimensions.get(*kind) else { continue };
            for constraint in dimension.constraints(inputs) {
                if constraint.referenced().iter().all(|r| survivors.contains(r)) {
                    constraints.push(constraint);
                } else {
                    debug!(constraint = constraint.name(), "dropping constraint with unmodeled reference");
                }
            }
        }

        Ok(DerivationModel { scope: scope.clone(), statics, dimensions, constraints, dropped })
    }
}
