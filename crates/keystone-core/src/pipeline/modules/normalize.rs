use crate::config::ModuleConfig;
use crate::error::Result;
use crate::image_buf::ImageBuf;
use crate::pipeline::module::ProcessingModule;

pub struct Normalize;

impl ProcessingModule for Normalize {
    fn name(&self) -> &str {
        "normalize"
    }

    fn process_cpu(&self, mut input: ImageBuf, config: &ModuleConfig) -> Result<ImageBuf> {
        if config.mean == [0.0; 3] && config.std == [1.0; 3] {
            return Ok(input);
        }

        let scale = config.std.map(|s| 1.0 / s);
        for pixel in input.data.chunks_exact_mut(3) {
            for c in 0..3 {
                pixel[c] = (pixel[c] - config.mean[c]) * scale[c];
            }
        }
        Ok(input)
    }
}
