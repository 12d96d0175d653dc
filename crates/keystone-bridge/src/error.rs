use keystone_core::VisionError;
use thiserror::Error;

/// Failures reported to the host. `Display` is the exact callback message.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Invalid image")]
    InvalidImage,

    #[error("Invalid heatmap")]
    InvalidHeatmap,

    #[error("Invalid input")]
    InvalidInput,

    #[error("Invalid corner format")]
    InvalidCornerFormat,

    #[error("Error in {operation}: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: VisionError,
    },

    #[error("Error in {operation}: task failed")]
    TaskFailed { operation: &'static str },
}

pub const PREPROCESS: &str = "preprocess";
pub const POSTPROCESS_HEATMAP: &str = "postprocessHeatmap";
pub const TRANSFORM_IMAGE: &str = "transformImage";

impl BridgeError {
    /// Map a core failure to what the host sees for `operation`.
    pub fn from_vision(operation: &'static str, err: VisionError) -> Self {
        match (operation, err) {
            (PREPROCESS, VisionError::InvalidImage(_)) => Self::InvalidImage,
            (POSTPROCESS_HEATMAP, VisionError::InvalidHeatmap(_)) => Self::InvalidHeatmap,
            (TRANSFORM_IMAGE, VisionError::InvalidImage(_) | VisionError::CornerCount(_)) => {
                Self::InvalidInput
            }
            (TRANSFORM_IMAGE, VisionError::CornerFormat { .. }) => Self::InvalidCornerFormat,
            (operation, source) => Self::Operation { operation, source },
        }
    }
}
