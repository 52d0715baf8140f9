//! Content-type conversion engine for fragments.
//!
//! A conversion is a pure function `(bytes, source, target) -> bytes`. The
//! [`Converter`] first checks `target` against the convertibility graph of
//! the [`TypeRegistry`](frag_types::TypeRegistry); only then does it dispatch
//! by family:
//!
//! - **text**: plain text, Markdown, HTML, CSV, JSON, YAML. Rules are keyed by
//!   `(source, target)` pair.
//! - **image**: PNG, JPEG, WebP, AVIF, GIF. Decode with the source codec and
//!   re-encode with the target codec.
//!
//! Conversions never cross families.

pub mod converter;
pub mod error;
mod raster;
mod text;

pub use converter::{Converted, Converter};
pub use error::{ConvertError, ConvertResult};
