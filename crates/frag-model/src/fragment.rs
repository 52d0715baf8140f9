use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use frag_convert::{Converted, Converter};
use frag_store::{FragmentStore, StoreError};
use frag_types::{FragmentId, FragmentMetadata, MediaKind, MediaType, OwnerId, TypeRegistry};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FragmentError, FragmentResult};

/// Unvalidated input for [`Fragment::new`].
///
/// `id`, `created` and `updated` are filled in when absent. `size` is
/// unsigned, so a negative size cannot be expressed.
#[derive(Clone, Debug, Default)]
pub struct FragmentParts {
    pub id: Option<String>,
    pub owner_id: String,
    pub content_type: String,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// A validated fragment record.
///
/// Every constructor checks the owner and the content type against a
/// [`TypeRegistry`], so a `Fragment` in hand always has a storable,
/// parsable type. Fields are private; mutation goes through the
/// store-backed operations, which only change `self` after the store
/// accepted the write.
///
/// Serializes as its metadata record and nothing else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Fragment {
    meta: FragmentMetadata,
}

impl Fragment {
    /// Validate `parts` and build a fragment. Nothing is persisted.
    pub fn new(parts: FragmentParts, registry: &TypeRegistry) -> FragmentResult<Self> {
        let owner_id = OwnerId::parse(parts.owner_id)?;
        let content_type = validate_type(&parts.content_type, registry)?;
        let id = match parts.id {
            Some(id) => FragmentId::parse(id)?,
            None => FragmentId::generate(),
        };
        let now = Utc::now();
        let created = parts.created.unwrap_or(now);
        let updated = parts.updated.unwrap_or(created);

        Ok(Self {
            meta: FragmentMetadata {
                id,
                owner_id,
                created,
                updated,
                content_type,
                size: parts.size,
            },
        })
    }

    /// Start an empty fragment for `owner` with a fresh id.
    pub fn create(
        owner: &OwnerId,
        content_type: &str,
        registry: &TypeRegistry,
    ) -> FragmentResult<Self> {
        Self::new(
            FragmentParts {
                owner_id: owner.as_str().to_owned(),
                content_type: content_type.to_owned(),
                ..FragmentParts::default()
            },
            registry,
        )
    }

    /// Rehydrate a stored record. The type is checked against the current
    /// registry, so records of a type that is no longer storable are
    /// rejected.
    pub fn from_metadata(meta: FragmentMetadata, registry: &TypeRegistry) -> FragmentResult<Self> {
        validate_type(&meta.content_type, registry)?;
        Ok(Self { meta })
    }

    // ---- accessors ----------------------------------------------------

    pub fn id(&self) -> &FragmentId {
        &self.meta.id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.meta.owner_id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.meta.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.meta.updated
    }

    /// Full content type as stored, parameters included.
    pub fn content_type(&self) -> &str {
        &self.meta.content_type
    }

    pub fn size(&self) -> u64 {
        self.meta.size
    }

    /// Parsed content type.
    pub fn media_type(&self) -> MediaType {
        MediaType::parse(&self.meta.content_type)
            .expect("content type validated at construction")
    }

    /// Base type without parameters, e.g. `text/plain`.
    pub fn mime_type(&self) -> String {
        self.media_type().essence().to_owned()
    }

    pub fn kind(&self) -> MediaKind {
        self.media_type()
            .kind()
            .expect("storable types are known kinds")
    }

    pub fn is_text(&self) -> bool {
        self.kind().is_text()
    }

    /// Types this fragment can be rendered as, its own type included.
    pub fn formats(&self, registry: &TypeRegistry) -> BTreeSet<MediaKind> {
        registry.convertible_targets(&self.meta.content_type)
    }

    // ---- persistence --------------------------------------------------

    /// Persist the metadata record, refreshing `updated`.
    pub async fn save<S>(&mut self, store: &S) -> FragmentResult<()>
    where
        S: FragmentStore + ?Sized,
    {
        let mut record = self.meta.clone();
        record.updated = Utc::now();
        store
            .write_metadata(&record)
            .await
            .map_err(self.fault("save"))?;
        self.meta = record;
        Ok(())
    }

    /// Store `data` as this fragment's payload and persist the metadata
    /// with the new size. On failure `self` is left as it was.
    pub async fn set_data<S>(&mut self, store: &S, data: &[u8]) -> FragmentResult<()>
    where
        S: FragmentStore + ?Sized,
    {
        let mut record = self.meta.clone();
        record.size = data.len() as u64;
        record.updated = Utc::now();
        store
            .write_fragment(&record, data)
            .await
            .map_err(self.fault("set data"))?;
        debug!(id = %record.id, size = record.size, "payload stored");
        self.meta = record;
        Ok(())
    }

    /// Replace both type and payload. The new type is validated before
    /// anything is written.
    pub async fn update<S>(
        &mut self,
        store: &S,
        registry: &TypeRegistry,
        content_type: &str,
        data: &[u8],
    ) -> FragmentResult<()>
    where
        S: FragmentStore + ?Sized,
    {
        let content_type = validate_type(content_type, registry)?;
        let mut record = self.meta.clone();
        record.content_type = content_type;
        record.size = data.len() as u64;
        record.updated = Utc::now();
        store
            .write_fragment(&record, data)
            .await
            .map_err(self.fault("update"))?;
        self.meta = record;
        Ok(())
    }

    /// Read the stored payload.
    pub async fn get_data<S>(&self, store: &S) -> FragmentResult<Vec<u8>>
    where
        S: FragmentStore + ?Sized,
    {
        store
            .read_data(self.owner_id(), self.id())
            .await
            .map_err(self.fault("read data"))?
            .ok_or_else(|| FragmentError::not_found(self.owner_id(), self.id()))
    }

    /// Render the payload as `target`.
    ///
    /// Convertibility is checked before the payload is read.
    pub async fn convert_to<S>(
        &self,
        store: &S,
        converter: &Converter,
        target: &MediaType,
    ) -> FragmentResult<Converted>
    where
        S: FragmentStore + ?Sized,
    {
        let source = self.media_type();
        let reachable = target
            .kind()
            .is_some_and(|to| converter.registry().can_convert(self.kind(), to));
        if !reachable {
            return Err(FragmentError::UnsupportedConversion {
                from: source.essence().to_owned(),
                to: target.essence().to_owned(),
            });
        }

        let data = self.get_data(store).await?;
        Ok(converter.convert(&data, &source, target)?)
    }

    /// Render the payload as the type an extension token names, e.g. `html`.
    pub async fn convert_to_extension<S>(
        &self,
        store: &S,
        converter: &Converter,
        ext: &str,
    ) -> FragmentResult<Converted>
    where
        S: FragmentStore + ?Sized,
    {
        let target = TypeRegistry::target_type_for_extension(ext).ok_or_else(|| {
            FragmentError::UnsupportedConversion {
                from: self.mime_type(),
                to: format!(".{ext}"),
            }
        })?;
        self.convert_to(store, converter, &target.media_type()).await
    }

    // ---- lookup -------------------------------------------------------

    /// Load one fragment. A record owned by someone else is reported as
    /// not found.
    pub async fn by_id<S>(
        store: &S,
        registry: &TypeRegistry,
        owner: &OwnerId,
        id: &FragmentId,
    ) -> FragmentResult<Self>
    where
        S: FragmentStore + ?Sized,
    {
        let meta = store
            .read_metadata(owner, id)
            .await
            .map_err(FragmentError::storage("read metadata", owner, id))?
            .ok_or_else(|| FragmentError::not_found(owner, id))?;
        if &meta.owner_id != owner || &meta.id != id {
            warn!(%owner, %id, "stored record does not match its key");
            return Err(FragmentError::not_found(owner, id));
        }
        Self::from_metadata(meta, registry)
    }

    /// Ids of every fragment `owner` has.
    pub async fn by_user<S>(store: &S, owner: &OwnerId) -> FragmentResult<Vec<FragmentId>>
    where
        S: FragmentStore + ?Sized,
    {
        store
            .list_ids(owner)
            .await
            .map_err(FragmentError::storage("list", owner, &"*"))
    }

    /// Full records of every fragment `owner` has. Records that no longer
    /// validate are skipped.
    pub async fn by_user_expanded<S>(
        store: &S,
        registry: &TypeRegistry,
        owner: &OwnerId,
    ) -> FragmentResult<Vec<Self>>
    where
        S: FragmentStore + ?Sized,
    {
        let records = store
            .list_metadata(owner)
            .await
            .map_err(FragmentError::storage("list", owner, &"*"))?;

        let mut fragments = Vec::with_capacity(records.len());
        for meta in records {
            if &meta.owner_id != owner {
                continue;
            }
            let id = meta.id.clone();
            match Self::from_metadata(meta, registry) {
                Ok(fragment) => fragments.push(fragment),
                Err(e) => warn!(%owner, %id, error = %e, "skipping unreadable fragment"),
            }
        }
        Ok(fragments)
    }

    /// Remove a fragment's metadata and payload.
    pub async fn delete<S>(store: &S, owner: &OwnerId, id: &FragmentId) -> FragmentResult<()>
    where
        S: FragmentStore + ?Sized,
    {
        let existed = store
            .delete(owner, id)
            .await
            .map_err(FragmentError::storage("delete", owner, id))?;
        if !existed {
            return Err(FragmentError::not_found(owner, id));
        }
        debug!(%owner, %id, "fragment deleted");
        Ok(())
    }

    fn fault(&self, operation: &'static str) -> impl FnOnce(StoreError) -> FragmentError {
        FragmentError::storage(operation, self.owner_id(), self.id())
    }
}

/// Check that `value` parses and names a storable kind. Returns the value
/// unchanged so parameters survive.
fn validate_type(value: &str, registry: &TypeRegistry) -> FragmentResult<String> {
    if value.trim().is_empty() {
        return Err(FragmentError::Validation("missing content type".into()));
    }
    let parsed = MediaType::parse(value)?;
    let storable = parsed.kind().is_some_and(|kind| registry.is_storable(kind));
    if !storable {
        return Err(FragmentError::Validation(format!(
            "unsupported content type {}",
            parsed.essence()
        )));
    }
    Ok(value.to_owned())
}
