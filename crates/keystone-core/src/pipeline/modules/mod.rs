mod normalize;
mod quantize;
mod resize;

pub use normalize::Normalize;
pub use quantize::Quantize;
pub use resize::Resize;
