//! Image normalisation: any supported raster → baseline RGB JPEG.
//!
//! Slide renditions arrive as GIF, PNG, JPEG or WebP. Every exporter wants
//! the same thing (an opaque RGB JPEG it can embed or copy verbatim), so the
//! fetcher normalises once here. Alpha is dropped; quality is fixed at 90.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageResult};
use tracing::debug;

/// JPEG quality used for every stored slide.
pub const JPEG_QUALITY: u8 = 90;

/// Decode `bytes` (format sniffed from content) into a raster image.
pub fn decode(bytes: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(bytes)
}

/// Re-encode `img` as an RGB JPEG at [`JPEG_QUALITY`].
pub fn encode_jpeg(img: &DynamicImage) -> ImageResult<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
    debug!(
        "Encoded {}x{} slide → {} bytes JPEG",
        rgb.width(),
        rgb.height(),
        buf.len()
    );
    Ok(buf)
}
