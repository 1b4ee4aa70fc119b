#![forbid(unsafe_code)]

//! Errors raised while building a derivation model.

use thiserror::Error;

use crate::types::DerivationType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A dimension reported that it can be modeled but offered no value.
    #[error("derivation type {0} has no legal value for this target")]
    EmptyDomain(DerivationType),

    /// A type resolved into the scope has no registered dimension.
    #[error("derivation type {0} is not registered")]
    Unregistered(DerivationType),

    #[error("covering strength must be at least 1")]
    InvalidStrength,

    /// Constraints exclude every combination.
    #[error("no combination satisfies the declared constraints")]
    Unsatisfiable,
}
