//! Error types for import runs.

use reconf_expression::ExpressionError;
use reconf_model::{EntityKind, ModelError};
use reconf_store::StoreError;
use thiserror::Error;

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Why an import run was aborted.
///
/// The first error ends the run; nothing is retried.
#[derive(Debug, Error)]
pub enum ImportError {
    /// A trigger or trigger prototype expression does not parse.
    #[error("Invalid expression \"{expression}\" of trigger \"{trigger}\": {source}")]
    Expression {
        /// Trigger description.
        trigger: String,
        /// Offending expression text.
        expression: String,
        /// Parser diagnostic.
        #[source]
        source: ExpressionError,
    },

    /// A natural key is neither in the snapshot nor in the store.
    #[error("Cannot find {kind} \"{reference}\" used by {context}.")]
    MissingReference {
        /// What kind of object was looked up.
        kind: &'static str,
        /// The unresolved natural key.
        reference: String,
        /// The referencing entity, with its host or discovery rule.
        context: String,
    },

    /// Importing the dependencies would close a cycle.
    #[error("Cannot create circular dependencies on trigger \"{trigger}\".")]
    CircularDependency {
        /// Trigger on which the cycle closes.
        trigger: String,
    },

    /// A trigger lists itself as a dependency.
    #[error("Cannot create dependency on trigger \"{trigger}\" itself.")]
    SelfDependency {
        /// The trigger.
        trigger: String,
    },

    /// Templates of the snapshot link each other in a loop.
    #[error("Circular template linkage between {}.", quoted(.templates))]
    CircularTemplateLinkage {
        /// Templates on the loop.
        templates: Vec<String>,
    },

    /// Two entities share a natural key.
    #[error("{kind} \"{key}\" is not unique{scope}.")]
    DuplicateKey {
        /// Kind of the entity.
        kind: EntityKind,
        /// The shared key.
        key: String,
        /// Rendered scope suffix.
        scope: String,
    },

    /// The snapshot asks for something the import rules forbid.
    #[error("{message}")]
    PolicyViolation {
        /// Description of the violation.
        message: String,
    },

    /// The snapshot is malformed.
    #[error("Invalid snapshot: {message}")]
    InvalidSnapshot {
        /// Description of the problem.
        message: String,
    },

    /// The snapshot format version is not supported.
    #[error("Unsupported snapshot version \"{version}\".")]
    UnsupportedVersion {
        /// Declared version.
        version: String,
    },

    /// The store rejected a call.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ImportError {
    /// Creates a missing reference error.
    pub fn missing(
        kind: EntityKind,
        reference: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::MissingReference {
            kind: kind.label(),
            reference: reference.into(),
            context: context.into(),
        }
    }

    /// Creates a missing interface error.
    pub fn missing_interface(reference: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingReference {
            kind: "interface",
            reference: reference.into(),
            context: context.into(),
        }
    }

    /// Creates a duplicate key error scoped to a host.
    pub fn duplicate_on(kind: EntityKind, key: impl Into<String>, host: &str) -> Self {
        Self::DuplicateKey {
            kind,
            key: key.into(),
            scope: format!(" on \"{host}\""),
        }
    }

    /// Creates a policy violation.
    pub fn policy(message: impl Into<String>) -> Self {
        Self::PolicyViolation {
            message: message.into(),
        }
    }
}

impl From<ModelError> for ImportError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnsupportedVersion { version } => Self::UnsupportedVersion { version },
            ModelError::DuplicateKey { kind, key, scope } => Self::DuplicateKey { kind, key, scope },
            ModelError::Invalid { message } => Self::InvalidSnapshot { message },
            ModelError::Json(err) => Self::InvalidSnapshot {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reference_names_the_context() {
        let err = ImportError::missing(
            EntityKind::Application,
            "CPU",
            "item \"system.cpu.load\" on \"web1\"",
        );
        assert_eq!(
            err.to_string(),
            "Cannot find application \"CPU\" used by item \"system.cpu.load\" on \"web1\"."
        );
    }

    #[test]
    fn template_cycle_lists_every_template() {
        let err = ImportError::CircularTemplateLinkage {
            templates: vec!["A".into(), "B".into()],
        };
        assert_eq!(
            err.to_string(),
            "Circular template linkage between \"A\", \"B\"."
        );
    }

    #[test]
    fn model_errors_map_onto_import_errors() {
        let err: ImportError = ModelError::duplicate_on(EntityKind::Item, "agent.ping", "web1").into();
        assert!(matches!(err, ImportError::DuplicateKey { kind: EntityKind::Item, .. }));
        assert_eq!(err.to_string(), "item \"agent.ping\" is not unique on \"web1\".");

        let err: ImportError = ModelError::UnsupportedVersion {
            version: "1.0".into(),
        }
        .into();
        assert!(matches!(err, ImportError::UnsupportedVersion { .. }));
    }

    #[test]
    fn store_errors_pass_through_unchanged() {
        let err: ImportError = StoreError::constraint("Empty application name.").into();
        assert_eq!(err.to_string(), "Empty application name.");
    }
}
