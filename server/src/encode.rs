use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{GrayImage, ImageFormat, RgbImage};

use crate::error::ApiError;

/// Serialize an RGB buffer as PNG and base64-encode it for a JSON field.
pub fn encode_rgb_png(image: &RgbImage) -> Result<String, ApiError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(ApiError::Encode)?;
    Ok(STANDARD.encode(buffer.into_inner()))
}

/// Serialize a binary mask as a grayscale PNG, base64-encoded.
pub fn encode_mask_png(mask: &GrayImage) -> Result<String, ApiError> {
    let mut buffer = Cursor::new(Vec::new());
    mask.write_to(&mut buffer, ImageFormat::Png)
        .map_err(ApiError::Encode)?;
    Ok(STANDARD.encode(buffer.into_inner()))
}

/// Decode an uploaded payload into RGB pixels. Any format the `image`
/// decoder can sniff is accepted; everything is normalized to RGB8.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, ApiError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|err| ApiError::InvalidImage(err.to_string()))?;
    Ok(decoded.to_rgb8())
}
