//! Text and binary encodings used across the bridge.
//!
//! Images, tensors and heatmaps all travel as base64 text. Platform
//! encoders wrap lines at 76 columns, so decoding skips ASCII whitespace;
//! encoding never wraps.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgb, RgbImage, Rgba};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VisionError};
use crate::image_buf::ImageBuf;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Native,
    Little,
    Big,
}

pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    if text.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        return Ok(STANDARD.decode(compact)?);
    }
    Ok(STANDARD.decode(text)?)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode PNG/JPEG/TIFF bytes into an RGB buffer, premultiplying any alpha.
pub fn decode_image(bytes: &[u8]) -> Result<ImageBuf> {
    let img = image::load_from_memory(bytes)?;
    debug!(
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "decoded image"
    );
    if !img.color().has_alpha() {
        return Ok(ImageBuf::from_rgb8(&img.into_rgb8()));
    }
    // Composite onto black: colour channels are premultiplied by alpha.
    let rgba = img.into_rgba8();
    let rgb = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let mul = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
        Rgb([mul(r), mul(g), mul(b)])
    });
    Ok(ImageBuf::from_rgb8(&rgb))
}

/// Base64 text to image. Any failure on the way is an [`VisionError::InvalidImage`].
pub fn decode_image_base64(text: &str) -> Result<ImageBuf> {
    let bytes = decode_base64(text).map_err(|e| VisionError::InvalidImage(e.to_string()))?;
    decode_image(&bytes).map_err(|e| VisionError::InvalidImage(e.to_string()))
}

/// Encode as an opaque 8-bit RGBA PNG.
pub fn encode_png(buf: &ImageBuf) -> Result<Vec<u8>> {
    let rgba = buf.to_rgba_image()?;
    let mut png = Vec::new();
    rgba.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    debug!(size = png.len(), "encoded png");
    Ok(png)
}

pub fn floats_to_bytes(values: &[f32], order: ByteOrder) -> Vec<u8> {
    match order {
        ByteOrder::Native => bytemuck::cast_slice::<f32, u8>(values).to_vec(),
        ByteOrder::Little => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        ByteOrder::Big => values.iter().flat_map(|v| v.to_be_bytes()).collect(),
    }
}

/// Read as many whole f32 values as `bytes` holds; a trailing partial
/// value is ignored.
pub fn bytes_to_floats(bytes: &[u8], order: ByteOrder) -> Vec<f32> {
    let read: fn([u8; 4]) -> f32 = match order {
        ByteOrder::Native => f32::from_ne_bytes,
        ByteOrder::Little => f32::from_le_bytes,
        ByteOrder::Big => f32::from_be_bytes,
    };
    bytes
        .chunks_exact(4)
        .map(|c| read([c[0], c[1], c[2], c[3]]))
        .collect()
}
