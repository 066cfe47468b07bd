//! JSON file persistence for [`MemoryStore`].
//!
//! A store file sits next to a lock file:
//!
//! ```text
//! <dir>/
//! ├─ store.json        # Serialized state
//! ├─ store.json.lock   # Advisory lock, held while the file is open
//! └─ store.json.tmp    # Written on save, then renamed over store.json
//! ```

use crate::error::{StoreError, StoreResult};
use crate::memory::state::StoreState;
use crate::memory::MemoryStore;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// An exclusively opened store file.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct StoreFile {
    path: PathBuf,
    _lock_file: File,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl StoreFile {
    /// Opens `path`, which need not exist yet, and locks it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the lock.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(with_suffix(&path, ".lock"))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }
        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    /// Path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the store. A missing or empty file yields an empty store.
    pub fn load(&self) -> StoreResult<MemoryStore> {
        if !self.path.exists() || fs::metadata(&self.path)?.len() == 0 {
            debug!(path = %self.path.display(), "starting with an empty store");
            return Ok(MemoryStore::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let state: StoreState = serde_json::from_reader(reader)?;
        debug!(path = %self.path.display(), "store loaded");
        Ok(MemoryStore::from_state(state))
    }

    /// Writes the store atomically: temp file, sync, rename.
    pub fn save(&self, store: &MemoryStore) -> StoreResult<()> {
        let temp_path = with_suffix(&self.path, ".tmp");
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &store.snapshot_state())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&temp_path, &self.path)?;
        debug!(path = %self.path.display(), "store saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{GroupRecord, HostKind, HostRecord};
    use crate::query::HostQuery;
    use crate::store::ConfigStore;
    use reconf_model::{EntityId, HostStatus};
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempdir().unwrap();
        let file = StoreFile::open(dir.path().join("store.json")).unwrap();
        let store = file.load().unwrap();
        assert!(store.row_counts().is_empty());
    }

    #[test]
    fn save_then_load_keeps_rows_and_ids() {
        let dir = tempdir().unwrap();
        let file = StoreFile::open(dir.path().join("store.json")).unwrap();
        let store = MemoryStore::new();
        let group = store
            .create_groups(vec![GroupRecord {
                id: EntityId::default(),
                name: "Templates".into(),
            }])
            .unwrap()[0];
        store
            .create_hosts(vec![HostRecord {
                id: EntityId::default(),
                host: "Base".into(),
                name: "Base".into(),
                kind: HostKind::Template,
                status: HostStatus::Monitored,
                description: None,
                group_ids: vec![group],
                template_ids: Vec::new(),
                proxy_id: None,
                macros: Vec::new(),
                interfaces: Vec::new(),
            }])
            .unwrap();
        file.save(&store).unwrap();
        assert!(!dir.path().join("store.json.tmp").exists());

        let loaded = file.load().unwrap();
        let hosts = loaded.get_hosts(&HostQuery::new()).unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].group_ids, vec![group]);
        let next = loaded
            .create_groups(vec![GroupRecord {
                id: EntityId::default(),
                name: "Linux".into(),
            }])
            .unwrap()[0];
        assert!(next > hosts[0].id);
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let _first = StoreFile::open(&path).unwrap();
        assert!(matches!(StoreFile::open(&path), Err(StoreError::Locked)));
    }
}
