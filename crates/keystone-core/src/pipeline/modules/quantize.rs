use crate::config::ModuleConfig;
use crate::error::Result;
use crate::image_buf::ImageBuf;
use crate::pipeline::module::ProcessingModule;

/// Snap values back onto the 8-bit grid after resampling.
///
/// The model was trained on images resized as 8-bit pixels and only then
/// scaled to float, so interpolated values are rounded to the nearest
/// `k / 255` to reproduce that input distribution.
pub struct Quantize;

impl ProcessingModule for Quantize {
    fn name(&self) -> &str {
        "quantize"
    }

    fn process_cpu(&self, mut input: ImageBuf, _config: &ModuleConfig) -> Result<ImageBuf> {
        for v in &mut input.data {
            *v = (v.clamp(0.0, 1.0) * 255.0).round() / 255.0;
        }
        Ok(input)
    }
}
