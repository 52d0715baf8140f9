use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Conversion family of a base media type.
///
/// Conversions never cross families: text is never rendered as an image and
/// images are never rendered as text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    /// Structured or plain text formats.
    Text,
    /// Raster image codecs.
    Image,
}

/// The closed set of base media types known to the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaKind {
    TextPlain,
    TextMarkdown,
    TextHtml,
    TextCsv,
    ApplicationJson,
    ApplicationYaml,
    ImagePng,
    ImageJpeg,
    ImageWebp,
    ImageAvif,
    ImageGif,
}

impl MediaKind {
    /// Every known kind, text family first.
    pub const ALL: [MediaKind; 11] = [
        Self::TextPlain,
        Self::TextMarkdown,
        Self::TextHtml,
        Self::TextCsv,
        Self::ApplicationJson,
        Self::ApplicationYaml,
        Self::ImagePng,
        Self::ImageJpeg,
        Self::ImageWebp,
        Self::ImageAvif,
        Self::ImageGif,
    ];

    /// The canonical `type/subtype` string.
    pub const fn essence(&self) -> &'static str {
        match self {
            Self::TextPlain => "text/plain",
            Self::TextMarkdown => "text/markdown",
            Self::TextHtml => "text/html",
            Self::TextCsv => "text/csv",
            Self::ApplicationJson => "application/json",
            Self::ApplicationYaml => "application/yaml",
            Self::ImagePng => "image/png",
            Self::ImageJpeg => "image/jpeg",
            Self::ImageWebp => "image/webp",
            Self::ImageAvif => "image/avif",
            Self::ImageGif => "image/gif",
        }
    }

    /// Look up a kind by its (already lower-cased) `type/subtype`.
    pub fn from_essence(essence: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.essence() == essence)
    }

    pub const fn family(&self) -> Family {
        match self {
            Self::TextPlain
            | Self::TextMarkdown
            | Self::TextHtml
            | Self::TextCsv
            | Self::ApplicationJson
            | Self::ApplicationYaml => Family::Text,
            Self::ImagePng | Self::ImageJpeg | Self::ImageWebp | Self::ImageAvif | Self::ImageGif => {
                Family::Image
            }
        }
    }

    pub fn is_text(&self) -> bool {
        self.family() == Family::Text
    }

    /// A `MediaType` with no parameters for this kind.
    pub fn media_type(&self) -> MediaType {
        MediaType {
            essence: self.essence().to_string(),
            params: Vec::new(),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.essence())
    }
}

/// A parsed content type: `type/subtype` plus ordered parameters.
///
/// The essence and parameter names are lower-cased; parameter values keep
/// their case with surrounding quotes removed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MediaType {
    essence: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    /// Parse a `Content-Type` style string.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidMediaType {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = value.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        if essence.is_empty() {
            return Err(TypeError::Empty("media type"));
        }
        let (top, sub) = essence
            .split_once('/')
            .ok_or_else(|| invalid("missing '/'"))?;
        if !is_token(top) || !is_token(sub) {
            return Err(invalid("type and subtype must be non-empty tokens"));
        }

        let mut params = Vec::new();
        for raw in parts {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let (name, val) = raw
                .split_once('=')
                .ok_or_else(|| invalid("parameter without '='"))?;
            let name = name.trim().to_ascii_lowercase();
            if !is_token(&name) {
                return Err(invalid("invalid parameter name"));
            }
            params.push((name, unquote(val.trim())));
        }

        Ok(Self { essence, params })
    }

    /// The `type/subtype` portion, parameters stripped.
    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Look up a parameter value by (case-insensitive) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.params
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The known kind for this essence, if any.
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_essence(&self.essence)
    }

    /// `true` for any `text/*` type, known or not.
    pub fn is_text(&self) -> bool {
        self.essence.starts_with("text/")
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        for (name, value) in &self.params {
            if is_token(value) {
                write!(f, "; {name}={value}")?;
            } else {
                write!(f, "; {name}=\"{}\"", value.replace('"', "\\\""))?;
            }
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<MediaKind> for MediaType {
    fn from(kind: MediaKind) -> Self {
        kind.media_type()
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\""),
        None => value.to_string(),
    }
}
