use tracing::{debug, info, warn};

use crate::codec::{self, ByteOrder};
use crate::config::{HeatmapConfig, ModuleConfig, ensure_pixel_budget};
use crate::contour::find_external_contours;
use crate::error::{Result, VisionError};
use crate::geometry::Point;
use crate::image_buf::Plane;

/// Split a raw float32 payload into per-channel planes.
///
/// The payload is channel-major `[c, h, w]`; values past the expected
/// count are ignored.
pub fn decode_heatmap(
    bytes: &[u8],
    shape: &HeatmapConfig,
    order: ByteOrder,
) -> Result<Vec<Plane>> {
    let needed = shape.value_count() * 4;
    if bytes.len() < needed {
        return Err(VisionError::HeatmapTooShort {
            expected: needed,
            actual: bytes.len(),
        });
    }
    let values = codec::bytes_to_floats(&bytes[..needed], order);
    let plane_len = shape.width as usize * shape.height as usize;
    values
        .chunks_exact(plane_len)
        .map(|chunk| Plane::from_data(shape.width, shape.height, chunk.to_vec()))
        .collect()
}

/// Locate the peak blob of one channel in original image coordinates.
///
/// The channel is upsampled to the original size, thresholded, and the
/// centroid of the largest external blob is returned. Ties keep the first
/// blob in raster order; blobs of zero area never qualify.
pub fn channel_peak(
    channel: &Plane,
    width: u32,
    height: u32,
    threshold: f32,
) -> Result<Option<Point>> {
    let mask = channel.resize(width, height)?.threshold(threshold);
    let contours = find_external_contours(&mask);

    let mut best: Option<(f64, usize)> = None;
    for (i, contour) in contours.iter().enumerate() {
        let area = contour.area();
        if area > best.map_or(0.0, |(a, _)| a) {
            best = Some((area, i));
        }
    }
    debug!(
        blobs = contours.len(),
        best_area = ?best.map(|(a, _)| a),
        "channel contours"
    );

    Ok(best.and_then(|(_, i)| contours[i].moments().centroid()))
}

/// Turn network heatmaps into corner points (one per channel at most).
pub fn postprocess_planes(
    planes: &[Plane],
    original_width: i64,
    original_height: i64,
    threshold: f32,
    max_pixels: u64,
) -> Result<Vec<Point>> {
    if original_width <= 0
        || original_height <= 0
        || original_width > u32::MAX as i64
        || original_height > u32::MAX as i64
    {
        return Err(VisionError::InvalidDimensions {
            width: original_width,
            height: original_height,
        });
    }
    let (width, height) = (original_width as u32, original_height as u32);
    ensure_pixel_budget(width, height, max_pixels)?;

    let mut corners = Vec::with_capacity(planes.len());
    for (channel, plane) in planes.iter().enumerate() {
        match channel_peak(plane, width, height, threshold)? {
            Some(p) => corners.push(p),
            None => debug!(channel, "no corner blob"),
        }
    }
    Ok(corners)
}

pub fn postprocess_heatmap(
    heatmap_base64: &str,
    original_width: i64,
    original_height: i64,
    config: &ModuleConfig,
) -> Result<Vec<Point>> {
    let t0 = std::time::Instant::now();
    let bytes = codec::decode_base64(heatmap_base64).map_err(|e| match e {
        VisionError::Base64(inner) => VisionError::InvalidHeatmap(inner),
        other => other,
    })?;
    info!(
        bytes = bytes.len(),
        original_width, original_height, "postprocess heatmap"
    );

    let planes = decode_heatmap(&bytes, &config.heatmap, config.byte_order)?;
    let corners = postprocess_planes(
        &planes,
        original_width,
        original_height,
        config.heatmap.threshold,
        config.max_output_pixels,
    )?;
    if corners.len() < planes.len() {
        warn!(
            found = corners.len(),
            expected = planes.len(),
            "some corners not detected"
        );
    }
    debug!(elapsed_ms = t0.elapsed().as_millis(), "heatmap done");
    Ok(corners)
}
