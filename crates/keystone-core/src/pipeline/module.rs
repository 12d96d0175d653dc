use crate::config::ModuleConfig;
use crate::error::Result;
use crate::image_buf::ImageBuf;

/// A single step in the preprocessing pipeline.
pub trait ProcessingModule: Send + Sync {
    fn name(&self) -> &str;
    fn process_cpu(&self, input: ImageBuf, config: &ModuleConfig) -> Result<ImageBuf>;
}
