//! Storage contract for fragment metadata and payloads.
//!
//! Every fragment is addressed by `(owner, id)`. A store keeps two records per
//! key: the JSON-shaped [`FragmentMetadata`](frag_types::FragmentMetadata) and
//! the raw payload bytes. They are written independently, but the provided
//! [`FragmentStore::write_fragment`] always writes the payload first so
//! metadata never describes bytes that were not stored.
//!
//! # Storage Backends
//!
//! All backends implement the [`FragmentStore`] trait:
//!
//! - [`InMemoryFragmentStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsFragmentStore`] -- one directory per owner on the local filesystem
//!
//! # Design Rules
//!
//! 1. Missing records are normal outcomes, not errors.
//! 2. Metadata writes replace the whole record.
//! 3. Delete removes metadata and payload together and reports whether
//!    anything existed.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsFragmentStore;
pub use memory::InMemoryFragmentStore;
pub use traits::FragmentStore;
