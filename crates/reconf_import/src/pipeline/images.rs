//! Images.

use super::ImportContext;
use crate::config::UserRole;
use crate::error::ImportResult;
use reconf_model::{EntityId, EntityKind, Image};
use reconf_store::{ConfigStore, ImageRecord};
use tracing::warn;

/// Creates and updates images. Only super admins may write images; for
/// anyone else the stage is skipped and false is returned.
pub(super) fn import_images<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    images: &[Image],
) -> ImportResult<bool> {
    if ctx.role != UserRole::SuperAdmin {
        warn!(images = images.len(), role = ?ctx.role, "images need a super admin, skipped");
        return Ok(false);
    }
    let policy = ctx.options.images;
    let mut creates = Vec::new();
    let mut updates = Vec::new();
    for image in images {
        let record = ImageRecord {
            id: EntityId::default(),
            name: image.name.clone(),
            image_type: image.imagetype,
            encoded_image: image.encoded_image.clone(),
        };
        match ctx.resolver.image(&image.name)? {
            // the store keeps the stored type on update
            Some(id) if policy.update_existing => updates.push(ImageRecord { id, ..record }),
            None if policy.create_missing => creates.push(record),
            _ => {}
        }
    }

    if !creates.is_empty() {
        let names: Vec<String> = creates.iter().map(|r| r.name.clone()).collect();
        let ids = ctx.store.create_images(creates)?;
        for (name, id) in names.iter().zip(&ids) {
            ctx.resolver.bind_image(name, *id);
        }
        ctx.report.created(EntityKind::Image, ids.len());
    }
    if !updates.is_empty() {
        let ids = ctx.store.update_images(updates)?;
        ctx.report.updated(EntityKind::Image, ids.len());
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use crate::{EntityPolicy, ImportOptions, ImportPipeline, Stage, UserRole};
    use reconf_model::{EntityKind, ImageType, Snapshot};
    use reconf_store::{ConfigStore, MemoryStore};

    const IMAGES: &str = r#"{"images": [
        {"name": "Server", "imagetype": "icon", "encodedImage": "iVBORw0KGgo="},
        {"name": "Floor plan", "imagetype": "background", "encodedImage": "R0lGODlh"}
    ]}"#;

    fn options() -> ImportOptions {
        ImportOptions::new().with_images(EntityPolicy::upsert())
    }

    #[test]
    fn super_admin_creates_images() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(IMAGES).unwrap();
        let report = ImportPipeline::new(&store, options()).run(&snapshot).unwrap();
        assert_eq!(report.count(EntityKind::Image).created, 2);
        assert!(report.stages.contains(&Stage::Images));
    }

    #[test]
    fn admin_skips_images() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(IMAGES).unwrap();
        let report = ImportPipeline::new(&store, options())
            .with_role(UserRole::Admin)
            .run(&snapshot)
            .unwrap();
        assert!(report.is_noop());
        assert!(!report.stages.contains(&Stage::Images));
        assert!(store.get_images(None).unwrap().is_empty());
    }

    #[test]
    fn update_keeps_the_stored_type() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(IMAGES).unwrap();
        ImportPipeline::new(&store, options()).run(&snapshot).unwrap();

        let retyped = Snapshot::from_json_str(
            r#"{"images": [{"name": "Server", "imagetype": "background", "encodedImage": "AAAA"}]}"#,
        )
        .unwrap();
        let report = ImportPipeline::new(&store, options()).run(&retyped).unwrap();
        assert_eq!(report.count(EntityKind::Image).updated, 1);

        let server = store
            .get_images(Some(&["Server".to_string()]))
            .unwrap()
            .remove(0);
        assert_eq!(server.image_type, ImageType::Icon);
        assert_eq!(server.encoded_image, "AAAA");
    }
}
