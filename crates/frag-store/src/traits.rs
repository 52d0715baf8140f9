use async_trait::async_trait;
use frag_types::{FragmentId, FragmentMetadata, OwnerId};

use crate::error::StoreResult;

/// Durable key/value storage for fragment metadata and payloads.
///
/// Every record is addressed by `(owner, id)`. All implementations must
/// satisfy these invariants:
/// - A metadata write replaces the whole record; partial-field updates are
///   never observable.
/// - A missing record is a normal outcome (`Ok(None)` / `Ok(false)`), never
///   an error.
/// - An owner's records are only reachable through that owner's key space.
/// - All backend errors are propagated, never silently ignored.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// Upsert the metadata record keyed by `(record.owner_id, record.id)`.
    async fn write_metadata(&self, record: &FragmentMetadata) -> StoreResult<()>;

    /// Read a metadata record. Returns `Ok(None)` if it does not exist.
    async fn read_metadata(
        &self,
        owner: &OwnerId,
        id: &FragmentId,
    ) -> StoreResult<Option<FragmentMetadata>>;

    /// Store the raw payload for a fragment, replacing any previous bytes.
    async fn write_data(&self, owner: &OwnerId, id: &FragmentId, data: &[u8]) -> StoreResult<()>;

    /// Read the raw payload. Returns `Ok(None)` if it does not exist.
    async fn read_data(&self, owner: &OwnerId, id: &FragmentId) -> StoreResult<Option<Vec<u8>>>;

    /// List the ids of every fragment (with metadata) owned by `owner`.
    ///
    /// Order is unspecified. An unknown owner yields an empty list.
    async fn list_ids(&self, owner: &OwnerId) -> StoreResult<Vec<FragmentId>>;

    /// Remove both metadata and payload for a key.
    ///
    /// Returns `Ok(true)` if anything existed, `Ok(false)` if the key was
    /// already absent.
    async fn delete(&self, owner: &OwnerId, id: &FragmentId) -> StoreResult<bool>;

    /// Write a payload and then the metadata that describes it.
    ///
    /// The payload goes first so that metadata never claims a size that was
    /// not stored. If the payload write fails, metadata is left untouched.
    /// Backends that can apply both writes atomically should override this.
    async fn write_fragment(&self, record: &FragmentMetadata, data: &[u8]) -> StoreResult<()> {
        self.write_data(&record.owner_id, &record.id, data).await?;
        self.write_metadata(record).await
    }

    /// Read every metadata record owned by `owner`.
    ///
    /// Ids that vanish between listing and reading are skipped.
    async fn list_metadata(&self, owner: &OwnerId) -> StoreResult<Vec<FragmentMetadata>> {
        let mut records = Vec::new();
        for id in self.list_ids(owner).await? {
            if let Some(record) = self.read_metadata(owner, &id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}
