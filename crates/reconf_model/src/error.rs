//! Error types for snapshot loading and validation.

use crate::EntityKind;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while reading or validating a snapshot.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The snapshot could not be decoded.
    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// The snapshot declares a format version this crate cannot read.
    #[error("unsupported snapshot version \"{version}\"")]
    UnsupportedVersion {
        /// Declared version.
        version: String,
    },

    /// Two entities share a natural key within the same scope.
    #[error("{kind} \"{key}\" is declared more than once{scope}")]
    DuplicateKey {
        /// Kind of the duplicated entity.
        kind: EntityKind,
        /// The duplicated natural key.
        key: String,
        /// Rendered scope suffix, empty for global kinds.
        scope: String,
    },

    /// A structurally invalid entity.
    #[error("invalid snapshot: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

impl ModelError {
    /// Creates a duplicate key error for a globally scoped kind.
    pub fn duplicate(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            kind,
            key: key.into(),
            scope: String::new(),
        }
    }

    /// Creates a duplicate key error for a host scoped kind.
    pub fn duplicate_on(kind: EntityKind, key: impl Into<String>, owner: &str) -> Self {
        Self::DuplicateKey {
            kind,
            key: key.into(),
            scope: format!(" on \"{owner}\""),
        }
    }

    /// Creates an invalid snapshot error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_message_names_scope() {
        let err = ModelError::duplicate_on(EntityKind::Item, "agent.ping", "web1");
        assert_eq!(
            err.to_string(),
            "item \"agent.ping\" is declared more than once on \"web1\""
        );
        let err = ModelError::duplicate(EntityKind::Group, "Linux servers");
        assert_eq!(
            err.to_string(),
            "host group \"Linux servers\" is declared more than once"
        );
    }
}
