use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use frag_types::{FragmentId, FragmentMetadata, OwnerId};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::FragmentStore;

#[derive(Clone, Debug, Default)]
struct Slot {
    metadata: Option<FragmentMetadata>,
    data: Option<Vec<u8>>,
}

impl Slot {
    fn is_vacant(&self) -> bool {
        self.metadata.is_none() && self.data.is_none()
    }
}

type Owners = HashMap<OwnerId, HashMap<FragmentId, Slot>>;

/// In-memory, HashMap-based fragment store.
///
/// Intended for tests and embedding. Metadata and payload for a key live in
/// one slot behind a single `RwLock`, so [`FragmentStore::write_fragment`]
/// and [`FragmentStore::delete`] apply both halves atomically.
pub struct InMemoryFragmentStore {
    owners: RwLock<Owners>,
}

impl InMemoryFragmentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            owners: RwLock::new(HashMap::new()),
        }
    }

    fn read_lock(&self) -> StoreResult<RwLockReadGuard<'_, Owners>> {
        self.owners
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write_lock(&self) -> StoreResult<RwLockWriteGuard<'_, Owners>> {
        self.owners
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    /// Number of fragments with metadata, across all owners.
    pub fn len(&self) -> usize {
        self.read_lock()
            .map(|owners| {
                owners
                    .values()
                    .flat_map(HashMap::values)
                    .filter(|slot| slot.metadata.is_some())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Returns `true` if no fragment metadata is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes across all owners.
    pub fn total_bytes(&self) -> u64 {
        self.read_lock()
            .map(|owners| {
                owners
                    .values()
                    .flat_map(HashMap::values)
                    .filter_map(|slot| slot.data.as_ref())
                    .map(|data| data.len() as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Remove everything from the store.
    pub fn clear(&self) {
        if let Ok(mut owners) = self.write_lock() {
            owners.clear();
        }
    }
}

impl Default for InMemoryFragmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FragmentStore for InMemoryFragmentStore {
    async fn write_metadata(&self, record: &FragmentMetadata) -> StoreResult<()> {
        let mut owners = self.write_lock()?;
        owners
            .entry(record.owner_id.clone())
            .or_default()
            .entry(record.id.clone())
            .or_default()
            .metadata = Some(record.clone());
        debug!(owner = %record.owner_id, id = %record.id, "wrote metadata");
        Ok(())
    }

    async fn read_metadata(
        &self,
        owner: &OwnerId,
        id: &FragmentId,
    ) -> StoreResult<Option<FragmentMetadata>> {
        let owners = self.read_lock()?;
        Ok(owners
            .get(owner)
            .and_then(|frags| frags.get(id))
            .and_then(|slot| slot.metadata.clone()))
    }

    async fn write_data(&self, owner: &OwnerId, id: &FragmentId, data: &[u8]) -> StoreResult<()> {
        let mut owners = self.write_lock()?;
        owners
            .entry(owner.clone())
            .or_default()
            .entry(id.clone())
            .or_default()
            .data = Some(data.to_vec());
        debug!(%owner, %id, bytes = data.len(), "wrote data");
        Ok(())
    }

    async fn read_data(&self, owner: &OwnerId, id: &FragmentId) -> StoreResult<Option<Vec<u8>>> {
        let owners = self.read_lock()?;
        Ok(owners
            .get(owner)
            .and_then(|frags| frags.get(id))
            .and_then(|slot| slot.data.clone()))
    }

    async fn list_ids(&self, owner: &OwnerId) -> StoreResult<Vec<FragmentId>> {
        let owners = self.read_lock()?;
        Ok(owners
            .get(owner)
            .map(|frags| {
                frags
                    .iter()
                    .filter(|(_, slot)| slot.metadata.is_some())
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, owner: &OwnerId, id: &FragmentId) -> StoreResult<bool> {
        let mut owners = self.write_lock()?;
        let Some(frags) = owners.get_mut(owner) else {
            return Ok(false);
        };
        let existed = frags.remove(id).is_some_and(|slot| !slot.is_vacant());
        if frags.is_empty() {
            owners.remove(owner);
        }
        debug!(%owner, %id, existed, "deleted fragment");
        Ok(existed)
    }

    async fn write_fragment(&self, record: &FragmentMetadata, data: &[u8]) -> StoreResult<()> {
        let mut owners = self.write_lock()?;
        let slot = owners
            .entry(record.owner_id.clone())
            .or_default()
            .entry(record.id.clone())
            .or_default();
        slot.data = Some(data.to_vec());
        slot.metadata = Some(record.clone());
        debug!(owner = %record.owner_id, id = %record.id, bytes = data.len(), "wrote fragment");
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryFragmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryFragmentStore")
            .field("fragment_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn owner(name: &str) -> OwnerId {
        OwnerId::parse(name).unwrap()
    }

    fn fid(id: &str) -> FragmentId {
        FragmentId::parse(id).unwrap()
    }

    fn record(owner_name: &str, id: &str, size: u64) -> FragmentMetadata {
        let now = Utc::now();
        FragmentMetadata {
            id: fid(id),
            owner_id: owner(owner_name),
            created: now,
            updated: now,
            content_type: "text/plain".into(),
            size,
        }
    }

    // -----------------------------------------------------------------------
    // Metadata and data
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn write_and_read_metadata() {
        let store = InMemoryFragmentStore::new();
        let rec = record("owner-id", "test-id", 0);
        store.write_metadata(&rec).await.unwrap();

        let read_back = store
            .read_metadata(&rec.owner_id, &rec.id)
            .await
            .unwrap()
            .expect("should exist");
        assert_eq!(read_back, rec);
    }

    #[tokio::test]
    async fn write_and_read_data() {
        let store = InMemoryFragmentStore::new();
        let rec = record("owner-id", "test-id", 17);
        store.write_metadata(&rec).await.unwrap();
        store
            .write_data(&rec.owner_id, &rec.id, b"Test data content")
            .await
            .unwrap();

        let data = store.read_data(&rec.owner_id, &rec.id).await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"Test data content"[..]));
    }

    #[tokio::test]
    async fn metadata_write_replaces_whole_record() {
        let store = InMemoryFragmentStore::new();
        let mut rec = record("o", "a", 1);
        store.write_metadata(&rec).await.unwrap();
        rec.size = 99;
        rec.content_type = "text/plain; charset=utf-8".into();
        store.write_metadata(&rec).await.unwrap();

        let read_back = store.read_metadata(&rec.owner_id, &rec.id).await.unwrap();
        assert_eq!(read_back, Some(rec));
    }

    #[tokio::test]
    async fn missing_records_are_none() {
        let store = InMemoryFragmentStore::new();
        let o = owner("unknown-owner");
        let id = fid("non-existent");
        assert!(store.read_metadata(&o, &id).await.unwrap().is_none());
        assert!(store.read_data(&o, &id).await.unwrap().is_none());
        assert!(store.list_ids(&o).await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_ids_and_metadata_per_owner() {
        let store = InMemoryFragmentStore::new();
        let recs = [record("o", "id1", 0), record("o", "id2", 0), record("other", "id3", 0)];
        for rec in &recs {
            store.write_metadata(rec).await.unwrap();
        }

        let mut ids = store.list_ids(&owner("o")).await.unwrap();
        ids.sort();
        assert_eq!(ids, vec![fid("id1"), fid("id2")]);

        let mut expanded = store.list_metadata(&owner("o")).await.unwrap();
        expanded.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(expanded, vec![recs[0].clone(), recs[1].clone()]);
    }

    #[tokio::test]
    async fn data_without_metadata_is_not_listed() {
        let store = InMemoryFragmentStore::new();
        store
            .write_data(&owner("o"), &fid("orphan"), b"bytes")
            .await
            .unwrap();
        assert!(store.list_ids(&owner("o")).await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Ownership isolation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn other_owner_cannot_see_records() {
        let store = InMemoryFragmentStore::new();
        let rec = record("alice", "shared-id", 3);
        store.write_fragment(&rec, b"abc").await.unwrap();

        let bob = owner("bob");
        assert!(store.read_metadata(&bob, &rec.id).await.unwrap().is_none());
        assert!(store.read_data(&bob, &rec.id).await.unwrap().is_none());
        assert!(!store.delete(&bob, &rec.id).await.unwrap());
        assert!(store.read_metadata(&rec.owner_id, &rec.id).await.unwrap().is_some());
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_removes_metadata_and_data() {
        let store = InMemoryFragmentStore::new();
        let rec = record("owner-id", "test-id", 17);
        store.write_fragment(&rec, b"Test data content").await.unwrap();

        assert!(store.delete(&rec.owner_id, &rec.id).await.unwrap());
        assert!(store.read_metadata(&rec.owner_id, &rec.id).await.unwrap().is_none());
        assert!(store.read_data(&rec.owner_id, &rec.id).await.unwrap().is_none());
        assert!(!store.delete(&rec.owner_id, &rec.id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_reports_false() {
        let store = InMemoryFragmentStore::new();
        assert!(!store.delete(&owner("o"), &fid("never")).await.unwrap());
    }

    // -----------------------------------------------------------------------
    // Utility methods
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn len_total_bytes_and_clear() {
        let store = InMemoryFragmentStore::default();
        assert!(store.is_empty());
        store.write_fragment(&record("o", "a", 5), b"12345").await.unwrap();
        store.write_fragment(&record("p", "b", 9), b"123456789").await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 14);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.total_bytes(), 0);
    }

    #[tokio::test]
    async fn concurrent_writers_on_distinct_keys() {
        let store = Arc::new(InMemoryFragmentStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let rec = record("o", &format!("id{i}"), 1);
                    store.write_fragment(&rec, b"x").await.unwrap();
                })
            })
            .collect();
        for h in handles {
            h.await.expect("task should not panic");
        }
        assert_eq!(store.list_ids(&owner("o")).await.unwrap().len(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_on_same_key_keep_pairs_together() {
        let store = Arc::new(InMemoryFragmentStore::new());
        for round in 0..50 {
            let handles: Vec<_> = [1usize, 1000]
                .into_iter()
                .map(|size| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        let rec = record("o", "contested", size as u64);
                        store.write_fragment(&rec, &vec![b'x'; size]).await.unwrap();
                    })
                })
                .collect();
            for h in handles {
                h.await.expect("task should not panic");
            }
            let meta = store.read_metadata(&owner("o"), &fid("contested")).await.unwrap().unwrap();
            let data = store.read_data(&owner("o"), &fid("contested")).await.unwrap().unwrap();
            assert_eq!(meta.size, data.len() as u64, "round {round}");
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryFragmentStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryFragmentStore"));
        assert!(debug.contains("fragment_count"));
    }
}
