//! Import policies and run settings.

use serde::{Deserialize, Serialize};

/// What to do with one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityPolicy {
    /// Create entities that are in the snapshot but not in the store.
    pub create_missing: bool,
    /// Update entities that are in both.
    pub update_existing: bool,
    /// Delete entities of processed hosts that are not in the snapshot.
    pub delete_missing: bool,
}

impl EntityPolicy {
    /// Does nothing.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            create_missing: false,
            update_existing: false,
            delete_missing: false,
        }
    }

    /// Creates missing entities only.
    #[must_use]
    pub const fn create() -> Self {
        Self {
            create_missing: true,
            update_existing: false,
            delete_missing: false,
        }
    }

    /// Creates missing and updates existing entities.
    #[must_use]
    pub const fn upsert() -> Self {
        Self {
            create_missing: true,
            update_existing: true,
            delete_missing: false,
        }
    }

    /// Creates, updates and deletes.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            create_missing: true,
            update_existing: true,
            delete_missing: true,
        }
    }

    /// Returns true if any of the three flags is set.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.create_missing || self.update_existing || self.delete_missing
    }

    /// Returns true if the stage writes anything besides deletions.
    #[must_use]
    pub const fn writes(&self) -> bool {
        self.create_missing || self.update_existing
    }
}

/// Per-kind import policies.
///
/// Everything is off by default. Groups and template linkage only honour
/// `create_missing`; applications ignore `update_existing`; images and maps
/// ignore `delete_missing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    /// Host groups.
    pub groups: EntityPolicy,
    /// Templates.
    pub templates: EntityPolicy,
    /// Hosts.
    pub hosts: EntityPolicy,
    /// Links between hosts or templates and their templates.
    pub template_linkage: EntityPolicy,
    /// Applications.
    pub applications: EntityPolicy,
    /// Items.
    pub items: EntityPolicy,
    /// Discovery rules and their prototypes.
    pub discovery_rules: EntityPolicy,
    /// Triggers.
    pub triggers: EntityPolicy,
    /// Graphs.
    pub graphs: EntityPolicy,
    /// Images.
    pub images: EntityPolicy,
    /// Maps.
    pub maps: EntityPolicy,
    /// Global screens.
    pub screens: EntityPolicy,
    /// Template screens.
    pub template_screens: EntityPolicy,
}

impl ImportOptions {
    /// All policies off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates everything that is missing and touches nothing else.
    #[must_use]
    pub fn create_all() -> Self {
        let create = EntityPolicy::create();
        Self {
            groups: create,
            templates: create,
            hosts: create,
            template_linkage: create,
            applications: create,
            items: create,
            discovery_rules: create,
            triggers: create,
            graphs: create,
            images: create,
            maps: create,
            screens: create,
            template_screens: create,
        }
    }

    /// Makes the store match the snapshot for every processed host.
    #[must_use]
    pub fn full_sync() -> Self {
        let all = EntityPolicy::all();
        Self {
            groups: EntityPolicy::create(),
            templates: EntityPolicy::upsert(),
            hosts: EntityPolicy::upsert(),
            template_linkage: EntityPolicy::create(),
            applications: all,
            items: all,
            discovery_rules: all,
            triggers: all,
            graphs: all,
            images: EntityPolicy::upsert(),
            maps: EntityPolicy::upsert(),
            screens: EntityPolicy::upsert(),
            template_screens: all,
        }
    }

    /// Reads options from JSON.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Sets the group policy.
    #[must_use]
    pub const fn with_groups(mut self, policy: EntityPolicy) -> Self {
        self.groups = policy;
        self
    }

    /// Sets the template policy.
    #[must_use]
    pub const fn with_templates(mut self, policy: EntityPolicy) -> Self {
        self.templates = policy;
        self
    }

    /// Sets the host policy.
    #[must_use]
    pub const fn with_hosts(mut self, policy: EntityPolicy) -> Self {
        self.hosts = policy;
        self
    }

    /// Sets the template linkage policy.
    #[must_use]
    pub const fn with_template_linkage(mut self, policy: EntityPolicy) -> Self {
        self.template_linkage = policy;
        self
    }

    /// Sets the application policy.
    #[must_use]
    pub const fn with_applications(mut self, policy: EntityPolicy) -> Self {
        self.applications = policy;
        self
    }

    /// Sets the item policy.
    #[must_use]
    pub const fn with_items(mut self, policy: EntityPolicy) -> Self {
        self.items = policy;
        self
    }

    /// Sets the discovery rule policy.
    #[must_use]
    pub const fn with_discovery_rules(mut self, policy: EntityPolicy) -> Self {
        self.discovery_rules = policy;
        self
    }

    /// Sets the trigger policy.
    #[must_use]
    pub const fn with_triggers(mut self, policy: EntityPolicy) -> Self {
        self.triggers = policy;
        self
    }

    /// Sets the graph policy.
    #[must_use]
    pub const fn with_graphs(mut self, policy: EntityPolicy) -> Self {
        self.graphs = policy;
        self
    }

    /// Sets the image policy.
    #[must_use]
    pub const fn with_images(mut self, policy: EntityPolicy) -> Self {
        self.images = policy;
        self
    }

    /// Sets the map policy.
    #[must_use]
    pub const fn with_maps(mut self, policy: EntityPolicy) -> Self {
        self.maps = policy;
        self
    }

    /// Sets the screen policy.
    #[must_use]
    pub const fn with_screens(mut self, policy: EntityPolicy) -> Self {
        self.screens = policy;
        self
    }

    /// Sets the template screen policy.
    #[must_use]
    pub const fn with_template_screens(mut self, policy: EntityPolicy) -> Self {
        self.template_screens = policy;
        self
    }
}

/// Role of the user running the import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Administrator.
    Admin,
    /// Super administrator, the only role allowed to import images.
    #[default]
    SuperAdmin,
}

/// Run-level settings for [`crate::import_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Who runs the import.
    pub role: UserRole,
    /// Run inside one store transaction.
    pub use_transaction: bool,
    /// Roll back even when the run succeeds.
    pub dry_run: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            role: UserRole::SuperAdmin,
            use_transaction: true,
            dry_run: false,
        }
    }
}

impl ImportConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user role.
    #[must_use]
    pub const fn role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }

    /// Sets whether the run is wrapped in a transaction.
    #[must_use]
    pub const fn use_transaction(mut self, value: bool) -> Self {
        self.use_transaction = value;
        self
    }

    /// Sets dry-run mode. Dry runs always use a transaction.
    #[must_use]
    pub const fn dry_run(mut self, value: bool) -> Self {
        self.dry_run = value;
        if value {
            self.use_transaction = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_is_off_by_default() {
        let options = ImportOptions::default();
        assert!(!options.items.is_active());
        assert!(!options.groups.create_missing);
    }

    #[test]
    fn presets() {
        let create = ImportOptions::create_all();
        assert!(create.hosts.create_missing);
        assert!(!create.hosts.update_existing);
        assert!(!create.items.delete_missing);

        let sync = ImportOptions::full_sync();
        assert!(sync.items.delete_missing);
        assert!(sync.hosts.update_existing);
        assert!(!sync.hosts.delete_missing);
        assert_eq!(sync.groups, EntityPolicy::create());
    }

    #[test]
    fn builder_pattern() {
        let options = ImportOptions::new()
            .with_items(EntityPolicy::all())
            .with_triggers(EntityPolicy::upsert());
        assert!(options.items.delete_missing);
        assert!(options.triggers.update_existing);
        assert!(!options.triggers.delete_missing);
        assert!(!options.graphs.is_active());
    }

    #[test]
    fn options_from_camel_case_json() {
        let options = ImportOptions::from_json_str(
            r#"{
                "groups": {"createMissing": true},
                "templateLinkage": {"createMissing": true},
                "items": {"createMissing": true, "updateExisting": true, "deleteMissing": true}
            }"#,
        )
        .unwrap();
        assert!(options.groups.create_missing);
        assert!(options.template_linkage.create_missing);
        assert_eq!(options.items, EntityPolicy::all());
        assert!(!options.hosts.is_active());
    }

    #[test]
    fn dry_run_forces_a_transaction() {
        let config = ImportConfig::new().use_transaction(false).dry_run(true);
        assert!(config.use_transaction);
        assert!(config.dry_run);
        assert_eq!(config.role, UserRole::SuperAdmin);
    }
}
