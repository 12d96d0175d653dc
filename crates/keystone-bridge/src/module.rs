use std::sync::Arc;

use keystone_core::{ModuleConfig, heatmap, preprocess, warp};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{BridgeError, POSTPROCESS_HEATMAP, PREPROCESS, TRANSFORM_IMAGE};
use crate::reply::Reply;

type Work = Box<dyn FnOnce(&ModuleConfig) -> keystone_core::Result<Value> + Send + 'static>;

/// The bridge module exposed to the host runtime.
///
/// Stateless apart from its config, so clones are cheap and calls may
/// overlap freely; completion order across calls is not guaranteed.
#[derive(Clone)]
pub struct VisionModule {
    config: Arc<ModuleConfig>,
    runtime: Handle,
}

impl VisionModule {
    pub const NAME: &'static str = "RNOpenCvLibrary";

    pub fn new(config: ModuleConfig, runtime: Handle) -> keystone_core::Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            runtime,
        })
    }

    /// Name the host registers the module under.
    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Image (base64) -> `{data, originalSize}` with a CHW float32 tensor.
    pub fn preprocess(
        &self,
        image_base64: String,
        callback: impl FnOnce(Reply) + Send + 'static,
    ) -> JoinHandle<()> {
        self.dispatch(PREPROCESS, preprocess_work(image_base64), callback)
    }

    /// Heatmap (base64 float32) -> array of `[x, y]` corner points.
    pub fn postprocess_heatmap(
        &self,
        heatmap_base64: String,
        original_width: i64,
        original_height: i64,
        callback: impl FnOnce(Reply) + Send + 'static,
    ) -> JoinHandle<()> {
        self.dispatch(
            POSTPROCESS_HEATMAP,
            heatmap_work(heatmap_base64, original_width, original_height),
            callback,
        )
    }

    /// Image (base64) + four `[x, y]` corners -> `{data, width, height}` PNG.
    pub fn transform_image(
        &self,
        image_base64: String,
        corners: Vec<Vec<f64>>,
        callback: impl FnOnce(Reply) + Send + 'static,
    ) -> JoinHandle<()> {
        self.dispatch(
            TRANSFORM_IMAGE,
            transform_work(image_base64, corners),
            callback,
        )
    }

    pub async fn preprocess_async(&self, image_base64: String) -> Reply {
        self.run(PREPROCESS, preprocess_work(image_base64)).await
    }

    pub async fn postprocess_heatmap_async(
        &self,
        heatmap_base64: String,
        original_width: i64,
        original_height: i64,
    ) -> Reply {
        self.run(
            POSTPROCESS_HEATMAP,
            heatmap_work(heatmap_base64, original_width, original_height),
        )
        .await
    }

    pub async fn transform_image_async(
        &self,
        image_base64: String,
        corners: Vec<Vec<f64>>,
    ) -> Reply {
        self.run(TRANSFORM_IMAGE, transform_work(image_base64, corners))
            .await
    }

    fn dispatch(
        &self,
        operation: &'static str,
        work: Work,
        callback: impl FnOnce(Reply) + Send + 'static,
    ) -> JoinHandle<()> {
        let this = self.clone();
        self.runtime.spawn(async move {
            let reply = this.run(operation, work).await;
            callback(reply);
        })
    }

    async fn run(&self, operation: &'static str, work: Work) -> Reply {
        let config = Arc::clone(&self.config);
        let t0 = std::time::Instant::now();
        let joined = self.runtime.spawn_blocking(move || work(config.as_ref())).await;
        let reply = match joined {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(operation, %err, "bridge call rejected");
                Err(BridgeError::from_vision(operation, err))
            }
            Err(join_err) => {
                error!(operation, %join_err, "bridge task failed");
                Err(BridgeError::TaskFailed { operation })
            }
        };
        debug!(
            operation,
            ok = reply.is_ok(),
            elapsed_ms = t0.elapsed().as_millis(),
            "bridge call finished"
        );
        reply
    }
}

fn preprocess_work(image_base64: String) -> Work {
    Box::new(move |config| {
        let out = preprocess::preprocess(&image_base64, config)?;
        Ok(serde_json::to_value(out)?)
    })
}

fn heatmap_work(heatmap_base64: String, width: i64, height: i64) -> Work {
    Box::new(move |config| {
        let corners = heatmap::postprocess_heatmap(&heatmap_base64, width, height, config)?;
        Ok(serde_json::to_value(corners)?)
    })
}

fn transform_work(image_base64: String, corners: Vec<Vec<f64>>) -> Work {
    Box::new(move |config| {
        let out = warp::transform_image(&image_base64, &corners, config)?;
        Ok(serde_json::to_value(out)?)
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use image::{ImageFormat, Rgb, RgbImage};
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::reply::to_callback_args;

    fn module() -> VisionModule {
        VisionModule::new(ModuleConfig::default(), Handle::current()).unwrap()
    }

    fn png_base64(width: u32, height: u32) -> String {
        let img = RgbImage::from_pixel(width, height, Rgb([30, 60, 90]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        STANDARD.encode(png)
    }

    fn heatmap_base64(blobs: &[(f32, f32)]) -> String {
        let mut bytes = Vec::new();
        for &(cx, cy) in blobs {
            for i in 0..128 * 128 {
                let dx = (i % 128) as f32 - cx;
                let dy = (i / 128) as f32 - cy;
                let v = (-(dx * dx + dy * dy) / 18.0).exp();
                bytes.extend_from_slice(&v.to_ne_bytes());
            }
        }
        STANDARD.encode(bytes)
    }

    #[test]
    fn registered_name() {
        assert_eq!(VisionModule::NAME, "RNOpenCvLibrary");
    }

    #[test]
    fn rejects_invalid_config() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let config = ModuleConfig {
            input_size: 0,
            ..Default::default()
        };
        assert!(VisionModule::new(config, rt.handle().clone()).is_err());
    }

    #[tokio::test]
    async fn preprocess_callback_receives_tensor() {
        let module = module();
        let (tx, rx) = oneshot::channel();
        module.preprocess(png_base64(300, 200), move |reply| {
            let _ = tx.send(reply);
        });

        let value = rx.await.unwrap().unwrap();
        assert_eq!(value["originalSize"], json!({"width": 300, "height": 200}));
        let data = STANDARD.decode(value["data"].as_str().unwrap()).unwrap();
        assert_eq!(data.len(), 3 * 256 * 256 * 4);
    }

    #[tokio::test]
    async fn preprocess_invalid_image_message() {
        let module = module();
        let (tx, rx) = oneshot::channel();
        let handle = module.preprocess("bm90IGFuIGltYWdl".into(), move |reply| {
            let _ = tx.send(to_callback_args(&reply));
        });
        handle.await.unwrap();
        assert_eq!(rx.await.unwrap(), json!(["Invalid image", null]));
    }

    #[tokio::test]
    async fn heatmap_callback_receives_points() {
        let module = module();
        let centers = [(16.0, 16.0), (112.0, 16.0), (112.0, 112.0), (16.0, 112.0)];
        let text = heatmap_base64(&centers);
        let (tx, rx) = oneshot::channel();
        module.postprocess_heatmap(text, 256, 256, move |reply| {
            let _ = tx.send(reply);
        });

        let value = rx.await.unwrap().unwrap();
        let points = value.as_array().unwrap();
        assert_eq!(points.len(), 4);
        let first = points[0].as_array().unwrap();
        assert!((first[0].as_f64().unwrap() - 32.5).abs() < 1.5);
        assert!((first[1].as_f64().unwrap() - 32.5).abs() < 1.5);
    }

    #[tokio::test]
    async fn heatmap_errors() {
        let module = module();
        let reply = module
            .postprocess_heatmap_async("%%%".into(), 10, 10)
            .await;
        assert_eq!(reply.unwrap_err().to_string(), "Invalid heatmap");

        let reply = module
            .postprocess_heatmap_async(STANDARD.encode([0u8; 16]), 10, 10)
            .await;
        assert!(
            reply
                .unwrap_err()
                .to_string()
                .starts_with("Error in postprocessHeatmap: ")
        );
    }

    #[tokio::test]
    async fn transform_callback_receives_png() {
        let module = module();
        let corners = vec![
            vec![10.0, 10.0],
            vec![190.0, 10.0],
            vec![190.0, 100.0],
            vec![10.0, 100.0],
        ];
        let (tx, rx) = oneshot::channel();
        module.transform_image(png_base64(200, 120), corners, move |reply| {
            let _ = tx.send(reply);
        });

        let value = rx.await.unwrap().unwrap();
        assert_eq!(value["height"], json!(90));
        assert_eq!(value["width"], json!(160));
        let png = STANDARD.decode(value["data"].as_str().unwrap()).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (160, 90));
    }

    #[tokio::test]
    async fn transform_input_errors() {
        let module = module();
        let three = vec![vec![0.0, 0.0]; 3];
        let reply = module.transform_image_async(png_base64(8, 8), three).await;
        assert_eq!(reply.unwrap_err().to_string(), "Invalid input");

        let mut bad = vec![vec![0.0, 0.0]; 4];
        bad[1] = vec![1.0, 2.0, 3.0];
        let reply = module.transform_image_async(png_base64(8, 8), bad).await;
        assert_eq!(reply.unwrap_err().to_string(), "Invalid corner format");

        let good = vec![vec![0.0, 0.0]; 4];
        let reply = module.transform_image_async("@@".into(), good).await;
        assert_eq!(reply.unwrap_err().to_string(), "Invalid input");
    }

    #[tokio::test]
    async fn concurrent_calls_each_reply_once() {
        let module = module();
        let mut receivers = Vec::new();
        for size in [16, 32, 48] {
            let (tx, rx) = oneshot::channel();
            module.preprocess(png_base64(size, size), move |reply| {
                let _ = tx.send(reply);
            });
            receivers.push((size, rx));
        }
        for (size, rx) in receivers {
            let value = rx.await.unwrap().unwrap();
            assert_eq!(value["originalSize"]["width"], json!(size));
        }
    }

    #[tokio::test]
    async fn oversized_outputs_are_errors() {
        let module = module();
        let corners = vec![
            vec![0.0, 0.0],
            vec![1e5, 0.0],
            vec![1e5, 1e5],
            vec![0.0, 1e5],
        ];
        let reply = module.transform_image_async(png_base64(8, 8), corners).await;
        assert_eq!(
            reply.unwrap_err().to_string(),
            "Error in transformImage: output size 177777x100000 exceeds the 64000000 pixel limit"
        );

        let centers = [(16.0, 16.0), (112.0, 16.0), (112.0, 112.0), (16.0, 112.0)];
        let reply = module
            .postprocess_heatmap_async(heatmap_base64(&centers), 200_000, 200_000)
            .await;
        assert!(
            reply
                .unwrap_err()
                .to_string()
                .starts_with("Error in postprocessHeatmap: output size 200000x200000")
        );
    }

    #[tokio::test]
    async fn panicking_work_is_task_failed() {
        let module = module();
        let work: Work = Box::new(|_| panic!("worker blew up"));
        let reply = module.run(PREPROCESS, work).await;
        let err = reply.unwrap_err();
        assert!(matches!(err, BridgeError::TaskFailed { operation: PREPROCESS }));
        assert_eq!(err.to_string(), "Error in preprocess: task failed");
    }

    #[tokio::test]
    async fn panicking_work_still_fires_callback() {
        let module = module();
        let work: Work = Box::new(|_| panic!("worker blew up"));
        let (tx, rx) = oneshot::channel();
        let handle = module.dispatch(TRANSFORM_IMAGE, work, move |reply| {
            let _ = tx.send(to_callback_args(&reply));
        });
        handle.await.unwrap();
        assert_eq!(
            rx.await.unwrap(),
            json!(["Error in transformImage: task failed", null])
        );
    }
}
