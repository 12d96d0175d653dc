use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use keystone_bridge::reply::to_callback_args;
use keystone_bridge::{Callback, Reply, VisionModule};
use keystone_core::ModuleConfig;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::info;

use crate::cli::{Cli, Command};

/// Execute one command through the bridge and return the callback arguments.
pub async fn run(cli: Cli) -> Result<Value> {
    let config = match &cli.config {
        Some(path) => ModuleConfig::load(path)?,
        None => ModuleConfig::default(),
    };
    let module = VisionModule::new(config, Handle::current())?;
    info!(
        module = module.name(),
        input_size = module.config().input_size,
        max_output_pixels = module.config().max_output_pixels,
        "bridge ready"
    );

    match cli.command {
        Command::Preprocess { image, out } => {
            let image = read_base64(&image).await?;
            let reply = call(|cb| module.preprocess(image, cb)).await?;
            if let Some(out) = out {
                write_payload(&reply, &out).await?;
            }
            finish(reply)
        }
        Command::Heatmap {
            file,
            width,
            height,
        } => {
            let heatmap = read_base64(&file).await?;
            let reply = call(|cb| module.postprocess_heatmap(heatmap, width, height, cb)).await?;
            finish(reply)
        }
        Command::Transform {
            image,
            corners,
            out,
        } => {
            let image = read_base64(&image).await?;
            let corners = corners.into_iter().map(|c| c.0.to_vec()).collect();
            let reply = call(|cb| module.transform_image(image, corners, cb)).await?;
            if let Some(out) = out {
                write_payload(&reply, &out).await?;
            }
            finish(reply)
        }
    }
}

/// Invoke a callback-style bridge method and wait for its reply.
async fn call<F, T>(start: F) -> Result<Reply>
where
    F: FnOnce(Callback) -> T,
{
    let (tx, rx) = oneshot::channel();
    start(Box::new(move |reply| {
        let _ = tx.send(reply);
    }));
    rx.await.context("bridge dropped the callback")
}

fn finish(reply: Reply) -> Result<Value> {
    let args = to_callback_args(&reply);
    reply.map(|_| args).map_err(|e| anyhow!(e))
}

async fn read_base64(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

/// Decode the `data` field of a successful reply and write it to `out`.
async fn write_payload(reply: &Reply, out: &Path) -> Result<()> {
    let Ok(value) = reply else {
        return Ok(());
    };
    let data = value["data"]
        .as_str()
        .context("reply has no data field")?;
    let bytes = STANDARD.decode(data).context("decode reply data")?;
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("write {}", out.display()))?;
    info!(path = %out.display(), bytes = bytes.len(), "wrote payload");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::{Rgb, RgbImage};
    use serde_json::json;

    use super::*;
    use crate::cli::Corner;

    fn write_png(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("photo.png");
        RgbImage::from_pixel(width, height, Rgb([120, 80, 40]))
            .save(&path)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn preprocess_writes_tensor() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), 64, 48);
        let out = dir.path().join("tensor.bin");
        let cli = Cli {
            config: None,
            command: Command::Preprocess {
                image,
                out: Some(out.clone()),
            },
        };
        let args = run(cli).await.unwrap();
        assert_eq!(args[0], Value::Null);
        assert_eq!(args[1]["originalSize"], json!({"width": 64, "height": 48}));
        assert_eq!(std::fs::metadata(&out).unwrap().len(), 3 * 256 * 256 * 4);
    }

    #[tokio::test]
    async fn config_file_changes_input_size() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), 20, 20);
        let config = dir.path().join("config.json");
        std::fs::write(&config, r#"{"input_size": 32}"#).unwrap();
        let out = dir.path().join("tensor.bin");
        let cli = Cli {
            config: Some(config),
            command: Command::Preprocess {
                image,
                out: Some(out.clone()),
            },
        };
        run(cli).await.unwrap();
        assert_eq!(std::fs::metadata(&out).unwrap().len(), 3 * 32 * 32 * 4);
    }

    #[tokio::test]
    async fn transform_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), 100, 80);
        let out = dir.path().join("rectified.png");
        let cli = Cli {
            config: None,
            command: Command::Transform {
                image,
                corners: vec![
                    Corner([0.0, 0.0]),
                    Corner([96.0, 0.0]),
                    Corner([96.0, 54.0]),
                    Corner([0.0, 54.0]),
                ],
                out: Some(out.clone()),
            },
        };
        let args = run(cli).await.unwrap();
        assert_eq!(args[1]["height"], json!(54));
        let png = image::open(&out).unwrap();
        assert_eq!((png.width(), png.height()), (96, 54));
    }

    #[tokio::test]
    async fn heatmap_too_short_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hm.bin");
        std::fs::write(&file, [0u8; 64]).unwrap();
        let cli = Cli {
            config: None,
            command: Command::Heatmap {
                file,
                width: 100,
                height: 100,
            },
        };
        let err = run(cli).await.unwrap_err();
        assert!(err.to_string().starts_with("Error in postprocessHeatmap"));
    }

    #[tokio::test]
    async fn missing_file_is_error() {
        let cli = Cli {
            config: None,
            command: Command::Preprocess {
                image: PathBuf::from("/nonexistent/photo.png"),
                out: None,
            },
        };
        let err = run(cli).await.unwrap_err();
        assert!(err.to_string().contains("read /nonexistent/photo.png"));
    }
}
