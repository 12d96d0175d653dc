pub mod codec;
pub mod config;
pub mod contour;
pub mod error;
pub mod geometry;
pub mod heatmap;
pub mod image_buf;
pub mod pipeline;
pub mod preprocess;
pub mod resize;
pub mod warp;

pub use config::{HeatmapConfig, ModuleConfig};
pub use error::{Result, VisionError};
pub use geometry::Point;
pub use image_buf::{ImageBuf, Plane};
