use image::{RgbImage, RgbaImage};

use crate::error::{Result, VisionError};

/// Display-referred f32 RGB image buffer.
///
/// Pixel data is stored as interleaved RGBRGBRGB... with 8-bit sources
/// mapped to [0, 1]. No gamma is removed: the detection network is trained
/// on plain `value / 255` inputs.
#[derive(Clone, Debug)]
pub struct ImageBuf {
    pub width: u32,
    pub height: u32,
    /// Flat pixel data: [R, G, B, R, G, B, ...].
    pub data: Vec<f32>,
}

impl ImageBuf {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize * 3],
        }
    }

    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(VisionError::BufferSize {
                width,
                height,
                channels: 3,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_rgb8(img: &RgbImage) -> Self {
        let data = img.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        Self {
            width: img.width(),
            height: img.height(),
            data,
        }
    }

    /// Convert to opaque RGBA u8 (for PNG output, like an ARGB_8888 bitmap).
    pub fn to_rgba_u8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixel_count() * 4);
        for pixel in self.data.chunks_exact(3) {
            out.push(unit_to_u8(pixel[0]));
            out.push(unit_to_u8(pixel[1]));
            out.push(unit_to_u8(pixel[2]));
            out.push(255);
        }
        out
    }

    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        let expected = self.pixel_count() * 4;
        let bytes = self.to_rgba_u8();
        let actual = bytes.len();
        RgbaImage::from_raw(self.width, self.height, bytes).ok_or(VisionError::BufferSize {
            width: self.width,
            height: self.height,
            channels: 4,
            expected,
            actual,
        })
    }

    /// Reorder interleaved HWC data into planar CHW (all R, all G, all B).
    pub fn to_chw(&self) -> Vec<f32> {
        let plane = self.pixel_count();
        let mut out = vec![0.0; plane * 3];
        for (i, pixel) in self.data.chunks_exact(3).enumerate() {
            out[i] = pixel[0];
            out[plane + i] = pixel[1];
            out[2 * plane + i] = pixel[2];
        }
        out
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

/// Single-channel f32 map (heatmap channel or binary mask).
#[derive(Clone, Debug, PartialEq)]
pub struct Plane {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(VisionError::BufferSize {
                width,
                height,
                channels: 1,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Binary threshold: `1.0` where `v > thresh`, `0.0` elsewhere.
    pub fn threshold(&self, thresh: f32) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .map(|&v| if v > thresh { 1.0 } else { 0.0 })
                .collect(),
        }
    }
}
