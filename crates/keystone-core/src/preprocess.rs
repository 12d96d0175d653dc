use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::{self, decode_image_base64};
use crate::config::ModuleConfig;
use crate::error::Result;
use crate::image_buf::ImageBuf;
use crate::pipeline::Pipeline;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalSize {
    pub width: u32,
    pub height: u32,
}

/// Network input tensor plus what postprocessing needs to map back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessOutput {
    /// Base64 of `3 * size * size` float32 values, channels-first.
    pub data: String,
    pub original_size: OriginalSize,
}

/// Channels-first float tensor `[c, h, w]`.
#[derive(Clone, Debug)]
pub struct Tensor {
    pub shape: [usize; 3],
    pub data: Vec<f32>,
}

/// Run the preprocessing pipeline on an already-decoded image.
pub fn to_tensor(image: ImageBuf, config: &ModuleConfig) -> Result<Tensor> {
    let processed = Pipeline::new().process_cpu(image, config)?;
    Ok(Tensor {
        shape: [3, processed.height as usize, processed.width as usize],
        data: processed.to_chw(),
    })
}

pub fn preprocess(image_base64: &str, config: &ModuleConfig) -> Result<PreprocessOutput> {
    let t0 = std::time::Instant::now();
    let image = decode_image_base64(image_base64)?;
    let original_size = OriginalSize {
        width: image.width,
        height: image.height,
    };
    info!(
        width = original_size.width,
        height = original_size.height,
        "preprocess"
    );

    let tensor = to_tensor(image, config)?;
    let bytes = codec::floats_to_bytes(&tensor.data, config.byte_order);
    debug!(
        shape = ?tensor.shape,
        bytes = bytes.len(),
        elapsed_ms = t0.elapsed().as_millis(),
        "tensor ready"
    );

    Ok(PreprocessOutput {
        data: codec::encode_base64(&bytes),
        original_size,
    })
}
