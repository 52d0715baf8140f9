//! Foundation types for fragments.
//!
//! This crate provides the identity, media-type, and metadata types shared by
//! every other fragments crate, plus the static [`TypeRegistry`] that decides
//! which content types may be stored and which renderings each one supports.
//!
//! # Key Types
//!
//! - [`FragmentId`] — Opaque fragment identifier (UUID v7 when generated)
//! - [`OwnerId`] — Opaque owner identifier, equality defines ownership
//! - [`MediaType`] — Parsed `type/subtype; param=value` content type
//! - [`MediaKind`] — Closed set of base types the system knows about
//! - [`FragmentMetadata`] — The stored metadata record
//! - [`TypeRegistry`] — Storable set plus the convertibility graph

pub mod error;
pub mod ids;
pub mod media;
pub mod metadata;
pub mod registry;

pub use error::TypeError;
pub use ids::{FragmentId, OwnerId};
pub use media::{Family, MediaKind, MediaType};
pub use metadata::FragmentMetadata;
pub use registry::TypeRegistry;
