use thiserror::Error;

pub type Result<T, E = VisionError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image codec: {0}")]
    Image(#[from] image::ImageError),

    #[error("undecodable image: {0}")]
    InvalidImage(String),

    #[error("undecodable heatmap: {0}")]
    InvalidHeatmap(base64::DecodeError),

    #[error("expected {expected} values for {width}x{height}x{channels}, got {actual}")]
    BufferSize {
        width: u32,
        height: u32,
        channels: u32,
        expected: usize,
        actual: usize,
    },

    #[error("heatmap payload holds {actual} bytes, need at least {expected}")]
    HeatmapTooShort { expected: usize, actual: usize },

    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("expected 4 corners, got {0}")]
    CornerCount(usize),

    #[error("corner {index} must be [x, y], got {len} values")]
    CornerFormat { index: usize, len: usize },

    #[error("corner points are degenerate, perspective transform is singular")]
    SingularTransform,

    #[error("output size {width}x{height} exceeds the {limit} pixel limit")]
    OutputTooLarge { width: u64, height: u64, limit: u64 },

    #[error("output size {width}x{height} is empty")]
    EmptyOutput { width: f64, height: f64 },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(String),
}
