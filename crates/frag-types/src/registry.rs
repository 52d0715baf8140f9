//! Static knowledge of storable types and the convertibility graph.
//!
//! The registry keeps two independent pieces of data:
//!
//! - the **storable set**: base types accepted when creating or updating a
//!   fragment. It is per-instance and defaults to `text/plain` only.
//! - the **convertibility graph**: for each source base type, the targets it
//!   may be rendered into. It is static and shared by every registry, so it
//!   can grow without changing what may be stored.

use std::collections::BTreeSet;

use crate::error::TypeError;
use crate::media::{MediaKind, MediaType};

use MediaKind::*;

const EXTENSIONS: &[(&str, MediaKind)] = &[
    ("txt", TextPlain),
    ("md", TextMarkdown),
    ("html", TextHtml),
    ("csv", TextCsv),
    ("json", ApplicationJson),
    ("yaml", ApplicationYaml),
    ("yml", ApplicationYaml),
    ("png", ImagePng),
    ("jpg", ImageJpeg),
    ("jpeg", ImageJpeg),
    ("webp", ImageWebp),
    ("avif", ImageAvif),
    ("gif", ImageGif),
];

/// Storable-type set plus the static convertibility graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRegistry {
    storable: BTreeSet<MediaKind>,
}

impl TypeRegistry {
    /// Registry that stores `text/plain` only.
    pub fn new() -> Self {
        Self::with_storable([TextPlain])
    }

    /// Registry with an explicit storable set.
    pub fn with_storable(kinds: impl IntoIterator<Item = MediaKind>) -> Self {
        Self {
            storable: kinds.into_iter().collect(),
        }
    }

    /// Registry that accepts every known type for storage.
    pub fn all_storable() -> Self {
        Self::with_storable(MediaKind::ALL)
    }

    /// Build a storable set from configured type strings.
    ///
    /// Every entry must name a known base type; parameters are ignored.
    pub fn from_type_names<S: AsRef<str>>(names: &[S]) -> Result<Self, TypeError> {
        let mut storable = BTreeSet::new();
        for name in names {
            let mt = MediaType::parse(name.as_ref())?;
            let kind = mt.kind().ok_or_else(|| TypeError::InvalidMediaType {
                value: name.as_ref().to_string(),
                reason: "unknown base type".into(),
            })?;
            storable.insert(kind);
        }
        Ok(Self { storable })
    }

    /// The storable kinds in a stable order.
    pub fn storable(&self) -> impl Iterator<Item = MediaKind> + '_ {
        self.storable.iter().copied()
    }

    pub fn is_storable(&self, kind: MediaKind) -> bool {
        self.storable.contains(&kind)
    }

    /// `true` if the base type of `value` may be stored. Parameters are
    /// ignored and unparsable values are unsupported.
    pub fn is_supported(&self, value: &str) -> bool {
        MediaType::parse(value)
            .ok()
            .and_then(|mt| mt.kind())
            .is_some_and(|kind| self.is_storable(kind))
    }

    /// Every target the base type of `value` may be rendered into,
    /// the type itself included. Unknown or unparsable types yield an
    /// empty set.
    pub fn convertible_targets(&self, value: &str) -> BTreeSet<MediaKind> {
        MediaType::parse(value)
            .ok()
            .and_then(|mt| mt.kind())
            .map(|kind| Self::targets_of(kind).iter().copied().collect())
            .unwrap_or_default()
    }

    /// `true` if `to` is in the convertibility row of `from`.
    pub fn can_convert(&self, from: MediaKind, to: MediaKind) -> bool {
        Self::targets_of(from).contains(&to)
    }

    /// The convertibility row for one source kind. The first entry is always
    /// the source itself.
    pub fn targets_of(kind: MediaKind) -> &'static [MediaKind] {
        match kind {
            TextPlain => &[TextPlain, TextMarkdown, TextHtml, ApplicationJson],
            TextMarkdown => &[TextMarkdown, TextHtml, TextPlain, ApplicationJson, TextCsv],
            TextHtml => &[TextHtml, TextMarkdown, TextPlain, TextCsv],
            TextCsv => &[TextCsv, ApplicationJson, TextHtml],
            ApplicationJson => &[
                ApplicationJson,
                TextPlain,
                TextCsv,
                TextHtml,
                TextMarkdown,
                ApplicationYaml,
            ],
            ApplicationYaml => &[
                ApplicationYaml,
                TextPlain,
                ApplicationJson,
                TextHtml,
                TextMarkdown,
            ],
            ImagePng => &[ImagePng, ImageJpeg, ImageWebp, ImageAvif, ImageGif],
            ImageJpeg => &[ImageJpeg, ImagePng, ImageWebp, ImageAvif, ImageGif],
            ImageWebp => &[ImageWebp, ImagePng, ImageJpeg, ImageAvif, ImageGif],
            // AVIF is encode-only; nothing decodes it.
            ImageAvif => &[ImageAvif],
            ImageGif => &[ImageGif, ImagePng, ImageJpeg, ImageWebp, ImageAvif],
        }
    }

    /// Map a file-extension token (`html`, `.JPG`, ...) to its canonical kind.
    pub fn target_type_for_extension(ext: &str) -> Option<MediaKind> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, kind)| *kind)
    }

    /// The preferred extension for a kind.
    pub fn extension_for(kind: MediaKind) -> &'static str {
        EXTENSIONS
            .iter()
            .find(|(_, k)| *k == kind)
            .map(|(e, _)| *e)
            .unwrap_or("bin")
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
