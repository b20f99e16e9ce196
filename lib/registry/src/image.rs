//! Image payload helpers

use base64::{engine::general_purpose::STANDARD, Engine as _};
use facereg_core::{Error, Result};
use image::DynamicImage;
use std::io::Cursor;

/// Decode a base64 image, with or without a `data:<mime>;base64,` prefix.
pub fn decode_base64_image(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once(',') {
        Some((_, data)) => data,
        None => encoded,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::Validation(format!("invalid base64 image: {}", e)))
}

/// Decode image bytes (PNG, JPEG) into pixels.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data)
        .map_err(|e| Error::Validation(format!("unreadable image: {}", e)))
}

/// Encode an image to PNG bytes
pub fn encode_png(image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
