pub mod module;
pub mod modules;

use tracing::debug;

use crate::config::ModuleConfig;
use crate::error::Result;
use crate::image_buf::ImageBuf;
use module::ProcessingModule;

/// Preprocessing pipeline that turns a decoded photo into network input.
///
/// ```text
/// Decoded RGB -> Resize (square) -> Quantize (8-bit grid) -> Normalize -> CHW tensor
/// ```
pub struct Pipeline {
    modules: Vec<Box<dyn ProcessingModule>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            modules: vec![
                Box::new(modules::Resize),
                Box::new(modules::Quantize),
                Box::new(modules::Normalize),
            ],
        }
    }

    pub fn process_cpu(&self, input: ImageBuf, config: &ModuleConfig) -> Result<ImageBuf> {
        let mut current = input;
        for module in &self.modules {
            let t0 = std::time::Instant::now();
            current = module.process_cpu(current, config)?;
            debug!(
                module = module.name(),
                elapsed_ms = t0.elapsed().as_millis(),
                "processed"
            );
        }
        Ok(current)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ModuleConfig {
        ModuleConfig {
            input_size: 8,
            ..Default::default()
        }
    }

    #[test]
    fn output_is_square_input_size() {
        let pipeline = Pipeline::new();
        let input = ImageBuf::from_data(100, 50, vec![0.3; 100 * 50 * 3]).unwrap();
        let output = pipeline.process_cpu(input, &small_config()).unwrap();
        assert_eq!(output.width, 8);
        assert_eq!(output.height, 8);
    }

    #[test]
    fn grid_aligned_uniform_image_is_preserved() {
        let pipeline = Pipeline::new();
        let v = 128.0 / 255.0;
        let input = ImageBuf::from_data(20, 20, vec![v; 20 * 20 * 3]).unwrap();
        let output = pipeline.process_cpu(input, &small_config()).unwrap();
        assert!(output.data.iter().all(|&x| (x - v).abs() < 1e-6));
    }

    #[test]
    fn normalization_applies_after_resize() {
        let pipeline = Pipeline::new();
        let input = ImageBuf::from_data(4, 4, vec![1.0; 48]).unwrap();
        let config = ModuleConfig {
            input_size: 2,
            mean: [0.5; 3],
            std: [0.5; 3],
            ..Default::default()
        };
        let output = pipeline.process_cpu(input, &config).unwrap();
        assert!(output.data.iter().all(|&x| (x - 1.0).abs() < 1e-6));
    }

    #[test]
    fn module_ordering() {
        let pipeline = Pipeline::new();
        let names: Vec<&str> = pipeline.modules.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["resize", "quantize", "normalize"]);
    }
}
