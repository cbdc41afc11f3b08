//! # Core Error Types
//!
//! Errors raised by systems and blueprint lookups.

use thiserror::Error;

use crate::ecs::{ComponentKey, EntityId};

/// Errors a system can raise while updating the world.
///
/// Any of these aborts the tick in progress.
#[derive(Error, Debug)]
pub enum SystemError {
    /// A component the system relies on was missing at update time.
    #[error("entity {entity} is missing component `{component}`")]
    MissingComponent {
        /// The entity being updated.
        entity: EntityId,
        /// The absent component.
        component: ComponentKey,
    },

    /// The world is in a state the system cannot handle.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Any other failure, boxed.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type for system hooks.
pub type SystemResult<T> = Result<T, SystemError>;

/// Errors raised by [`BlueprintRegistry`](crate::BlueprintRegistry).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlueprintError {
    /// No factory is registered under this name.
    #[error("unknown blueprint `{0}`")]
    Unknown(String),
}
