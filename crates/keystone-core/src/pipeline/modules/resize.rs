use crate::config::ModuleConfig;
use crate::error::Result;
use crate::image_buf::ImageBuf;
use crate::pipeline::module::ProcessingModule;

/// Squash to the square network input. Aspect ratio is not preserved.
pub struct Resize;

impl ProcessingModule for Resize {
    fn name(&self) -> &str {
        "resize"
    }

    fn process_cpu(&self, input: ImageBuf, config: &ModuleConfig) -> Result<ImageBuf> {
        let size = config.input_size;
        if input.width == size && input.height == size {
            return Ok(input);
        }
        input.resize(size, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resizes_to_input_size() {
        let buf = ImageBuf::from_data(40, 10, vec![0.5; 1200]).unwrap();
        let config = ModuleConfig {
            input_size: 8,
            ..Default::default()
        };
        let result = Resize.process_cpu(buf, &config).unwrap();
        assert_eq!((result.width, result.height), (8, 8));
        assert_eq!(result.data.len(), 8 * 8 * 3);
    }

    #[test]
    fn already_sized_is_identity() {
        let data: Vec<f32> = (0..48).map(|i| i as f32 / 48.0).collect();
        let buf = ImageBuf::from_data(4, 4, data.clone()).unwrap();
        let config = ModuleConfig {
            input_size: 4,
            ..Default::default()
        };
        let result = Resize.process_cpu(buf, &config).unwrap();
        assert_eq!(result.data, data);
    }

    #[test]
    fn empty_input_is_error() {
        let buf = ImageBuf::new(0, 0);
        assert!(Resize.process_cpu(buf, &ModuleConfig::default()).is_err());
    }
}
