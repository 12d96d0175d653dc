use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::ByteOrder;
use crate::error::{Result, VisionError};

/// Tunables for the three bridge operations.
///
/// Every field has a default matching the shipped corner detection model,
/// so an empty JSON object is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Side of the square network input, in pixels.
    pub input_size: u32,
    /// Per-channel mean subtracted after scaling to [0, 1].
    pub mean: [f32; 3],
    /// Per-channel divisor applied after mean subtraction.
    pub std: [f32; 3],
    pub heatmap: HeatmapConfig,
    /// Width / height of the rectified output.
    pub aspect_ratio: f64,
    /// Byte order of float tensors crossing the bridge.
    pub byte_order: ByteOrder,
    /// Largest image, in pixels, an operation may allocate for its output.
    pub max_output_pixels: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub width: u32,
    pub height: u32,
    /// One channel per document corner.
    pub channels: u32,
    pub threshold: f32,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            input_size: 256,
            mean: [0.0; 3],
            std: [1.0; 3],
            heatmap: HeatmapConfig::default(),
            aspect_ratio: 16.0 / 9.0,
            byte_order: ByteOrder::Native,
            max_output_pixels: 64_000_000,
        }
    }
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            channels: 4,
            threshold: 0.3,
        }
    }
}

impl HeatmapConfig {
    /// Number of f32 values one heatmap payload must contain.
    pub fn value_count(&self) -> usize {
        self.channels as usize * self.width as usize * self.height as usize
    }
}

/// Reject output sizes above `limit` pixels before anything is allocated.
pub fn ensure_pixel_budget(width: u32, height: u32, limit: u64) -> Result<()> {
    if width as u64 * height as u64 > limit {
        return Err(VisionError::OutputTooLarge {
            width: width as u64,
            height: height as u64,
            limit,
        });
    }
    Ok(())
}

impl ModuleConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| VisionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(?path, "loading module config");
        let text = std::fs::read_to_string(path)
            .map_err(|e| VisionError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(VisionError::Config("input_size must be positive".into()));
        }
        if self.std.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err(VisionError::Config("std entries must be finite and non-zero".into()));
        }
        let hm = &self.heatmap;
        if hm.width == 0 || hm.height == 0 || hm.channels == 0 {
            return Err(VisionError::Config(format!(
                "heatmap shape {}x{}x{} must be positive",
                hm.channels, hm.height, hm.width
            )));
        }
        if self.max_output_pixels == 0 {
            return Err(VisionError::Config("max_output_pixels must be positive".into()));
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(VisionError::Config(format!(
                "aspect_ratio {} must be positive",
                self.aspect_ratio
            )));
        }
        Ok(())
    }
}
