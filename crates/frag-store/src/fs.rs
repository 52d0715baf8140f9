//! Filesystem-backed fragment store.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<hex(owner)>/<hex(id)>.json   metadata record (JSON)
//! <root>/<hex(owner)>/<hex(id)>.bin    raw payload
//! ```
//!
//! Owner and fragment ids are opaque strings, so both are hex-encoded to keep
//! them filesystem-safe. Every file is written to a temporary sibling and then
//! renamed into place, so a reader sees either the old record or the new one.
//!
//! Writers to the same key are serialized through a per-key lock, so the
//! payload and metadata of one `write_fragment` are never paired with the
//! halves of a competing write.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use frag_types::{FragmentId, FragmentMetadata, OwnerId};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::FragmentStore;

const METADATA_EXT: &str = "json";
const DATA_EXT: &str = "bin";

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Fragment store rooted at a directory on the local filesystem.
///
/// Clones share the same key locks.
#[derive(Clone, Debug)]
pub struct FsFragmentStore {
    root: PathBuf,
    locks: Arc<Mutex<HashMap<(OwnerId, FragmentId), KeyLock>>>,
}

impl FsFragmentStore {
    /// Open a store rooted at `root`. The directory is created lazily on the
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner: &OwnerId) -> PathBuf {
        self.root.join(hex::encode(owner.as_str()))
    }

    fn file_path(&self, owner: &OwnerId, id: &FragmentId, ext: &str) -> PathBuf {
        self.owner_dir(owner)
            .join(format!("{}.{ext}", hex::encode(id.as_str())))
    }

    fn key_lock(&self, owner: &OwnerId, id: &FragmentId) -> StoreResult<KeyLock> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Unavailable("key lock table poisoned".into()))?;
        Ok(Arc::clone(
            locks.entry((owner.clone(), id.clone())).or_default(),
        ))
    }

    /// Drop the table entry for a key once nobody else holds its lock.
    fn release_key(&self, owner: &OwnerId, id: &FragmentId, lock: KeyLock) {
        drop(lock);
        if let Ok(mut locks) = self.locks.lock() {
            let key = (owner.clone(), id.clone());
            if locks.get(&key).is_some_and(|l| Arc::strong_count(l) == 1) {
                locks.remove(&key);
            }
        }
    }

    /// Number of keys with a writer in flight.
    #[cfg(test)]
    fn pending_keys(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    async fn put_metadata(&self, record: &FragmentMetadata) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let path = self.file_path(&record.owner_id, &record.id, METADATA_EXT);
        write_atomic(path, bytes).await?;
        debug!(owner = %record.owner_id, id = %record.id, "wrote metadata");
        Ok(())
    }

    async fn put_data(&self, owner: &OwnerId, id: &FragmentId, data: &[u8]) -> StoreResult<()> {
        let path = self.file_path(owner, id, DATA_EXT);
        write_atomic(path, data.to_vec()).await?;
        debug!(%owner, %id, bytes = data.len(), "wrote data");
        Ok(())
    }

    async fn remove_pair(&self, owner: &OwnerId, id: &FragmentId) -> StoreResult<bool> {
        // Metadata first: once it is gone the fragment is invisible to lookups.
        let had_metadata = remove_optional(&self.file_path(owner, id, METADATA_EXT)).await?;
        let had_data = remove_optional(&self.file_path(owner, id, DATA_EXT)).await?;
        debug!(%owner, %id, existed = had_metadata || had_data, "deleted fragment");
        Ok(had_metadata || had_data)
    }
}

async fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_optional(path: &Path) -> StoreResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Write `bytes` to `path` through a temporary file in the same directory.
async fn write_atomic(path: PathBuf, bytes: Vec<u8>) -> StoreResult<()> {
    tokio::task::spawn_blocking(move || -> StoreResult<()> {
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Unavailable(format!("no parent for {}", path.display())))?;
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| StoreError::Unavailable(format!("write task failed: {e}")))?
}

#[async_trait]
impl FragmentStore for FsFragmentStore {
    async fn write_metadata(&self, record: &FragmentMetadata) -> StoreResult<()> {
        let lock = self.key_lock(&record.owner_id, &record.id)?;
        let result = {
            let _guard = lock.lock().await;
            self.put_metadata(record).await
        };
        self.release_key(&record.owner_id, &record.id, lock);
        result
    }

    async fn read_metadata(
        &self,
        owner: &OwnerId,
        id: &FragmentId,
    ) -> StoreResult<Option<FragmentMetadata>> {
        let path = self.file_path(owner, id, METADATA_EXT);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    async fn write_data(&self, owner: &OwnerId, id: &FragmentId, data: &[u8]) -> StoreResult<()> {
        let lock = self.key_lock(owner, id)?;
        let result = {
            let _guard = lock.lock().await;
            self.put_data(owner, id, data).await
        };
        self.release_key(owner, id, lock);
        result
    }

    async fn read_data(&self, owner: &OwnerId, id: &FragmentId) -> StoreResult<Option<Vec<u8>>> {
        read_optional(&self.file_path(owner, id, DATA_EXT)).await
    }

    async fn list_ids(&self, owner: &OwnerId) -> StoreResult<Vec<FragmentId>> {
        let dir = self.owner_dir(owner);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(METADATA_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let decoded = hex::decode(stem)
                .ok()
                .and_then(|raw| String::from_utf8(raw).ok())
                .and_then(|s| FragmentId::parse(s).ok());
            match decoded {
                Some(id) => ids.push(id),
                None => warn!("skipping unrecognised metadata file {:?}", path),
            }
        }
        Ok(ids)
    }

    async fn delete(&self, owner: &OwnerId, id: &FragmentId) -> StoreResult<bool> {
        let lock = self.key_lock(owner, id)?;
        let result = {
            let _guard = lock.lock().await;
            self.remove_pair(owner, id).await
        };
        self.release_key(owner, id, lock);
        result
    }

    /// Payload then metadata, both under the key lock.
    async fn write_fragment(&self, record: &FragmentMetadata, data: &[u8]) -> StoreResult<()> {
        let (owner, id) = (&record.owner_id, &record.id);
        let lock = self.key_lock(owner, id)?;
        let result = {
            let _guard = lock.lock().await;
            match self.put_data(owner, id, data).await {
                Ok(()) => self.put_metadata(record).await,
                Err(e) => Err(e),
            }
        };
        self.release_key(owner, id, lock);
        result
    }
}
