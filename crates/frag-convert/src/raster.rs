//! Image-family conversions: decode with the source codec, re-encode with
//! the target codec.

use std::io::Cursor;

use frag_types::MediaKind;
use image::{DynamicImage, ImageFormat};

use crate::error::{ConvertError, ConvertResult};

fn image_format(kind: MediaKind) -> Option<ImageFormat> {
    match kind {
        MediaKind::ImagePng => Some(ImageFormat::Png),
        MediaKind::ImageJpeg => Some(ImageFormat::Jpeg),
        MediaKind::ImageWebp => Some(ImageFormat::WebP),
        MediaKind::ImageAvif => Some(ImageFormat::Avif),
        MediaKind::ImageGif => Some(ImageFormat::Gif),
        _ => None,
    }
}

/// `true` if the bundled codecs can read `kind`. AVIF is write-only.
pub(crate) fn can_decode(kind: MediaKind) -> bool {
    image_format(kind).is_some() && kind != MediaKind::ImageAvif
}

/// Re-encode `data` from one image kind into another.
pub(crate) fn convert(data: &[u8], from: MediaKind, to: MediaKind) -> ConvertResult<Vec<u8>> {
    let (Some(source), Some(target)) = (image_format(from), image_format(to)) else {
        return Err(ConvertError::unsupported(from, to));
    };

    let decoded = image::load_from_memory_with_format(data, source)
        .map_err(|e| ConvertError::failed(to, e))?;

    // JPEG has no alpha channel; everything else takes RGBA.
    let prepared = match to {
        MediaKind::ImageJpeg => DynamicImage::ImageRgb8(decoded.to_rgb8()),
        _ => DynamicImage::ImageRgba8(decoded.to_rgba8()),
    };

    let mut out = Cursor::new(Vec::new());
    prepared
        .write_to(&mut out, target)
        .map_err(|e| ConvertError::failed(to, e))?;
    Ok(out.into_inner())
}
