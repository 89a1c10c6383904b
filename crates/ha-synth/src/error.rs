//! Error types for the synthesis engine
//!
//! Per-entity problems never surface here: they end up in the
//! [`GenerationReport`](crate::report::GenerationReport). These errors cover
//! broken invariants of an assembled document and misuse of the evaluator.

use ha_core::{EntityId, EntityIdError};
use thiserror::Error;

/// Result type for synthesis operations
pub type SynthResult<T> = Result<T, SynthError>;

/// Errors raised by the synthesis engine
#[derive(Debug, Error)]
pub enum SynthError {
    /// A generated identifier was not a valid entity id
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] EntityIdError),

    /// An entity reached compilation without a resolved controller
    #[error("{0} has no controller")]
    MissingController(EntityId),

    /// A rule references a state variable the document does not contain
    #[error("{entity} references missing state variable {variable}")]
    DanglingVariable { entity: EntityId, variable: EntityId },

    /// A rule delegates to an entity the document does not contain
    #[error("{entity} delegates to missing entity {target}")]
    DanglingDelegate { entity: EntityId, target: EntityId },

    /// Two entities share an id
    #[error("duplicate entity id {0}")]
    DuplicateEntity(EntityId),

    /// Two state variables share an id
    #[error("duplicate state variable id {0}")]
    DuplicateVariable(EntityId),
}
