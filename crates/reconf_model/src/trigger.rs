//! Triggers and trigger prototypes.

use serde::{Deserialize, Serialize};

/// Trigger severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Not classified.
    #[default]
    NotClassified,
    /// Information.
    Information,
    /// Warning.
    Warning,
    /// Average.
    Average,
    /// High.
    High,
    /// Disaster.
    Disaster,
}

/// Whether a trigger is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// Evaluated.
    #[default]
    Enabled,
    /// Ignored.
    Disabled,
}

/// Plain trigger attributes, copied to the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerSettings {
    /// Severity.
    #[serde(default)]
    pub priority: Severity,
    /// Status.
    #[serde(default)]
    pub status: TriggerStatus,
    /// Operator comments.
    #[serde(default)]
    pub comments: Option<String>,
    /// Related URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Reference to a trigger by its natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerRef {
    /// Trigger description.
    #[serde(alias = "name")]
    pub description: String,
    /// Trigger expression.
    pub expression: String,
}

/// Trigger or trigger prototype.
///
/// The natural key is the pair (description, expression). The hosts and
/// items a trigger depends on are encoded in its expression only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger description (its name).
    #[serde(alias = "name")]
    pub description: String,
    /// Trigger expression.
    pub expression: String,
    /// Plain attributes.
    #[serde(flatten)]
    pub settings: TriggerSettings,
    /// Triggers this trigger depends on.
    #[serde(default)]
    pub dependencies: Vec<TriggerRef>,
}

impl Trigger {
    /// Natural key of this trigger.
    #[must_use]
    pub fn key(&self) -> TriggerRef {
        TriggerRef {
            description: self.description.clone(),
            expression: self.expression.clone(),
        }
    }
}
