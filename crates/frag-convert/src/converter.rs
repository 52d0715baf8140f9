use frag_types::{Family, MediaKind, MediaType, TypeRegistry};
use tracing::debug;

use crate::error::{ConvertError, ConvertResult};
use crate::{raster, text};

/// Output of a successful conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Converted {
    /// Rendered bytes.
    pub data: Vec<u8>,
    /// Content type of `data`. Identity conversions keep the source type,
    /// parameters included.
    pub media_type: MediaType,
}

/// Registry-gated conversion engine.
///
/// Every request is checked against the registry's convertibility graph
/// before any family-specific code runs. The engine holds no mutable state
/// and may be shared freely across threads.
#[derive(Clone, Debug, Default)]
pub struct Converter {
    registry: TypeRegistry,
}

impl Converter {
    pub fn new(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Convert `data` of type `source` into `target`.
    pub fn convert(
        &self,
        data: &[u8],
        source: &MediaType,
        target: &MediaType,
    ) -> ConvertResult<Converted> {
        let (Some(from), Some(to)) = (source.kind(), target.kind()) else {
            return Err(ConvertError::unsupported(source.essence(), target.essence()));
        };
        if !self.registry.can_convert(from, to) {
            return Err(ConvertError::unsupported(from, to));
        }

        if from == to {
            return Ok(Converted {
                data: data.to_vec(),
                media_type: source.clone(),
            });
        }

        debug!(%from, %to, bytes = data.len(), "converting");
        let data = match from.family() {
            Family::Text => text::convert(data, from, to)?,
            Family::Image => raster::convert(data, from, to)?,
        };
        Ok(Converted {
            data,
            media_type: to.media_type(),
        })
    }

    /// Convert using unparsed content-type strings. A type that does not
    /// parse is reported as an unsupported conversion.
    pub fn convert_str(&self, data: &[u8], source: &str, target: &str) -> ConvertResult<Converted> {
        let parse = |s: &str| {
            MediaType::parse(s).map_err(|_| ConvertError::unsupported(source, target))
        };
        self.convert(data, &parse(source)?, &parse(target)?)
    }

    /// `true` if a conversion rule exists for the pair, independent of the
    /// registry graph.
    pub fn has_rule(from: MediaKind, to: MediaKind) -> bool {
        if from == to {
            return true;
        }
        match (from.family(), to.family()) {
            (Family::Text, Family::Text) => text::has_rule(from, to),
            (Family::Image, Family::Image) => raster::can_decode(from),
            _ => false,
        }
    }
}
