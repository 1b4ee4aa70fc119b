#![forbid(unsafe_code)]

//! Derivation and combinatorial modeling engine.
//!
//! A test declares a [`DerivationScope`]; the [`ModelBuilder`] resolves which
//! [`DerivationType`]s are in play against a feature report, asks every
//! dimension for its legal values and constraints, and produces a
//! [`DerivationModel`]. Each combination of the model is materialized into a
//! draft configuration by a [`DerivationContainer`].

pub mod container;
pub mod covering;
pub mod dimension;
pub mod dimensions;
pub mod error;
pub mod model;
pub mod registry;
pub mod scope;
pub mod types;

pub use container::{bitmask, DerivationContainer};
pub use covering::CoveringArrayGenerator;
pub use dimension::{ConditionalConstraint, DerivationInputs, Dimension, SideChannel};
pub use error::ModelError;
pub use model::{Combination, DerivationModel, ModelBuilder};
pub use registry::DimensionRegistry;
pub use scope::{resolve_types, DerivationScope, ModelRegistry, ModelType, StandardModelRegistry};
pub use types::{DerivationParameter, DerivationType, ParameterValue};
