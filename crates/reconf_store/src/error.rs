//! Error types for store operations.

use reconf_model::{EntityId, EntityKind};
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a configuration store.
///
/// A batched call that fails leaves the store unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store file could not be encoded or decoded.
    #[error("store file is invalid: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another process holds the store file.
    #[error("store is locked by another process")]
    Locked,

    /// The caller may not modify the object.
    #[error("No permissions to referred object or it does not exist! ({kind} {id})")]
    PermissionDenied {
        /// Kind of the protected object.
        kind: EntityKind,
        /// Id of the protected object.
        id: EntityId,
    },

    /// A referenced id does not exist.
    #[error("{kind} with id {id} does not exist")]
    NotFound {
        /// Kind of the missing object.
        kind: EntityKind,
        /// The missing id.
        id: EntityId,
    },

    /// A uniqueness constraint was violated.
    #[error("{kind} \"{key}\" already exists{scope}")]
    Duplicate {
        /// Kind of the object.
        kind: EntityKind,
        /// Colliding natural key.
        key: String,
        /// Rendered scope suffix.
        scope: String,
    },

    /// A row violates a store constraint.
    #[error("{message}")]
    Constraint {
        /// Description of the violation.
        message: String,
    },

    /// The operation is not allowed in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(kind: EntityKind, id: EntityId) -> Self {
        Self::NotFound { kind, id }
    }

    /// Creates a duplicate error for a global kind.
    pub fn duplicate(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::Duplicate {
            kind,
            key: key.into(),
            scope: String::new(),
        }
    }

    /// Creates a duplicate error for a host scoped kind.
    pub fn duplicate_on(kind: EntityKind, key: impl Into<String>, host: &str) -> Self {
        Self::Duplicate {
            kind,
            key: key.into(),
            scope: format!(" on \"{host}\""),
        }
    }

    /// Creates a constraint violation.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            StoreError::duplicate_on(EntityKind::Item, "agent.ping", "web1").to_string(),
            "item \"agent.ping\" already exists on \"web1\""
        );
        assert_eq!(
            StoreError::not_found(EntityKind::Trigger, EntityId::new(9)).to_string(),
            "trigger with id 9 does not exist"
        );
        let denied = StoreError::PermissionDenied {
            kind: EntityKind::Host,
            id: EntityId::new(3),
        };
        assert!(denied.to_string().starts_with("No permissions"));
    }
}
