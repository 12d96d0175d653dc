//! Perspective rectification of a quadrilateral into an upright rectangle.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::{self, decode_image_base64};
use crate::config::{ModuleConfig, ensure_pixel_budget};
use crate::error::{Result, VisionError};
use crate::geometry::Point;
use crate::image_buf::ImageBuf;

/// Row-major 3x3 projective transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography(pub [f64; 9]);

impl Homography {
    pub fn apply(&self, p: Point) -> Point {
        let m = &self.0;
        let w = m[6] * p.x + m[7] * p.y + m[8];
        let w = if w != 0.0 { 1.0 / w } else { 0.0 };
        Point::new(
            (m[0] * p.x + m[1] * p.y + m[2]) * w,
            (m[3] * p.x + m[4] * p.y + m[5]) * w,
        )
    }

    pub fn inverse(&self) -> Result<Homography> {
        let m = &self.0;
        let c00 = m[4] * m[8] - m[5] * m[7];
        let c01 = m[5] * m[6] - m[3] * m[8];
        let c02 = m[3] * m[7] - m[4] * m[6];
        let det = m[0] * c00 + m[1] * c01 + m[2] * c02;
        if det.abs() < f64::EPSILON {
            return Err(VisionError::SingularTransform);
        }
        let inv = 1.0 / det;
        Ok(Homography([
            c00 * inv,
            (m[2] * m[7] - m[1] * m[8]) * inv,
            (m[1] * m[5] - m[2] * m[4]) * inv,
            c01 * inv,
            (m[0] * m[8] - m[2] * m[6]) * inv,
            (m[2] * m[3] - m[0] * m[5]) * inv,
            c02 * inv,
            (m[1] * m[6] - m[0] * m[7]) * inv,
            (m[0] * m[4] - m[1] * m[3]) * inv,
        ]))
    }
}

/// Solve for the homography taking each `src[i]` to `dst[i]`, with `h22 = 1`.
pub fn perspective_transform(src: &[Point; 4], dst: &[Point; 4]) -> Result<Homography> {
    // a * [h00 h01 h02 h10 h11 h12 h20 h21]^T = b
    let mut a = [[0.0f64; 9]; 8];
    for i in 0..4 {
        let (x, y) = (src[i].x, src[i].y);
        let (u, v) = (dst[i].x, dst[i].y);
        a[i] = [x, y, 1.0, 0.0, 0.0, 0.0, -x * u, -y * u, u];
        a[i + 4] = [0.0, 0.0, 0.0, x, y, 1.0, -x * v, -y * v, v];
    }

    // Gaussian elimination with partial pivoting on the augmented matrix.
    for col in 0..8 {
        let pivot = (col..8)
            .max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(VisionError::SingularTransform);
        }
        a.swap(col, pivot);
        for row in 0..8 {
            if row == col {
                continue;
            }
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..9 {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let mut h = [0.0; 9];
    for i in 0..8 {
        h[i] = a[i][8] / a[i][i];
    }
    h[8] = 1.0;
    if h.iter().any(|v| !v.is_finite()) {
        return Err(VisionError::SingularTransform);
    }
    Ok(Homography(h))
}

/// Warp `src` through `forward` into a `width` x `height` image.
///
/// Each destination pixel is mapped back with the inverse transform and
/// sampled bilinearly; samples outside the source read as black.
pub fn warp_perspective(
    src: &ImageBuf,
    forward: &Homography,
    width: u32,
    height: u32,
) -> Result<ImageBuf> {
    let inverse = forward.inverse()?;
    let mut out = ImageBuf::new(width, height);
    let (sw, sh) = (src.width as i64, src.height as i64);

    let texel = |x: i64, y: i64| -> [f32; 3] {
        if x < 0 || y < 0 || x >= sw || y >= sh {
            return [0.0; 3];
        }
        let i = ((y * sw + x) * 3) as usize;
        [src.data[i], src.data[i + 1], src.data[i + 2]]
    };

    for (i, pixel) in out.data.chunks_exact_mut(3).enumerate() {
        let dx = (i % width as usize) as f64;
        let dy = (i / width as usize) as f64;
        let s = inverse.apply(Point::new(dx, dy));
        if !(s.x.is_finite() && s.y.is_finite()) {
            continue;
        }
        let (x0, y0) = (s.x.floor(), s.y.floor());
        if x0 < -1.0 || y0 < -1.0 || x0 >= sw as f64 || y0 >= sh as f64 {
            continue;
        }
        let (fx, fy) = ((s.x - x0) as f32, (s.y - y0) as f32);
        let (x0, y0) = (x0 as i64, y0 as i64);
        let a = texel(x0, y0);
        let b = texel(x0 + 1, y0);
        let c = texel(x0, y0 + 1);
        let d = texel(x0 + 1, y0 + 1);
        for ch in 0..3 {
            let top = a[ch] + (b[ch] - a[ch]) * fx;
            let bottom = c[ch] + (d[ch] - c[ch]) * fx;
            pixel[ch] = top + (bottom - top) * fy;
        }
    }
    Ok(out)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformOutput {
    /// Base64 PNG of the rectified region.
    pub data: String,
    pub width: u32,
    pub height: u32,
}

/// Validate loosely-typed corner input: exactly four `[x, y]` pairs.
pub fn parse_corners(corners: &[Vec<f64>]) -> Result<[Point; 4]> {
    if corners.len() != 4 {
        return Err(VisionError::CornerCount(corners.len()));
    }
    let mut out = [Point::default(); 4];
    for (index, (corner, slot)) in corners.iter().zip(out.iter_mut()).enumerate() {
        match corner.as_slice() {
            &[x, y] => *slot = Point::new(x, y),
            other => {
                return Err(VisionError::CornerFormat {
                    index,
                    len: other.len(),
                });
            }
        }
    }
    Ok(out)
}

/// Target rectangle for corners ordered top-left, top-right, bottom-right,
/// bottom-left: height is the shorter vertical edge, width follows the
/// aspect ratio.
pub fn target_size(corners: &[Point; 4], aspect_ratio: f64) -> (f64, f64) {
    let left = corners[0].distance(corners[3]);
    let right = corners[1].distance(corners[2]);
    let height = left.min(right);
    (height * aspect_ratio, height)
}

/// Rectify the quadrilateral `corners` of a decoded image into at most
/// `max_pixels` output pixels.
pub fn rectify(
    image: &ImageBuf,
    corners: &[Point; 4],
    aspect_ratio: f64,
    max_pixels: u64,
) -> Result<ImageBuf> {
    let (width, height) = target_size(corners, aspect_ratio);
    let (out_w, out_h) = (width as u32, height as u32);
    if out_w == 0 || out_h == 0 {
        return Err(VisionError::EmptyOutput { width, height });
    }
    ensure_pixel_budget(out_w, out_h, max_pixels)?;
    let dst = [
        Point::new(0.0, 0.0),
        Point::new(width, 0.0),
        Point::new(width, height),
        Point::new(0.0, height),
    ];
    let h = perspective_transform(corners, &dst)?;
    debug!(matrix = ?h.0, out_w, out_h, "perspective transform");
    warp_perspective(image, &h, out_w, out_h)
}

pub fn transform_image(
    image_base64: &str,
    corners: &[Vec<f64>],
    config: &ModuleConfig,
) -> Result<TransformOutput> {
    let t0 = std::time::Instant::now();
    let image = decode_image_base64(image_base64)?;
    let corners = parse_corners(corners)?;
    info!(
        width = image.width,
        height = image.height,
        ?corners,
        "transform image"
    );

    let rectified = rectify(&image, &corners, config.aspect_ratio, config.max_output_pixels)?;
    let png = codec::encode_png(&rectified)?;
    debug!(
        width = rectified.width,
        height = rectified.height,
        elapsed_ms = t0.elapsed().as_millis(),
        "rectified"
    );

    Ok(TransformOutput {
        data: codec::encode_base64(&png),
        width: rectified.width,
        height: rectified.height,
    })
}
