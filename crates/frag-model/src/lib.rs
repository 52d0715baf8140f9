//! The fragment entity.
//!
//! A [`Fragment`] is a validated metadata record plus operations that move
//! its payload through a [`FragmentStore`](frag_store::FragmentStore) and
//! render it through a [`Converter`](frag_convert::Converter).
//!
//! # Ownership
//!
//! Every lookup is keyed by `(owner, id)`. A fragment that exists under
//! another owner is indistinguishable from one that does not exist: both
//! surface as [`FragmentError::NotFound`].

pub mod error;
pub mod fragment;

pub use error::{ErrorKind, FragmentError, FragmentResult};
pub use fragment::{Fragment, FragmentParts};
