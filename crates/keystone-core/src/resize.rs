use crate::error::{Result, VisionError};
use crate::image_buf::{ImageBuf, Plane};

/// Bilinear resample of interleaved `channels`-wide pixel data.
///
/// Sample positions use pixel-center alignment, `(d + 0.5) * scale - 0.5`,
/// clamped to the source edge, so downscaling interpolates between the two
/// nearest source pixels rather than area-averaging.
pub fn resize_linear(
    src: &[f32],
    src_w: u32,
    src_h: u32,
    channels: usize,
    dst_w: u32,
    dst_h: u32,
) -> Result<Vec<f32>> {
    if src_w == 0 || src_h == 0 {
        return Err(VisionError::InvalidDimensions {
            width: src_w as i64,
            height: src_h as i64,
        });
    }
    if dst_w == 0 || dst_h == 0 {
        return Err(VisionError::InvalidDimensions {
            width: dst_w as i64,
            height: dst_h as i64,
        });
    }
    let expected = src_w as usize * src_h as usize * channels;
    if src.len() != expected {
        return Err(VisionError::BufferSize {
            width: src_w,
            height: src_h,
            channels: channels as u32,
            expected,
            actual: src.len(),
        });
    }

    let xs = taps(src_w, dst_w);
    let ys = taps(src_h, dst_h);
    let stride = src_w as usize * channels;
    let mut out = Vec::with_capacity(dst_w as usize * dst_h as usize * channels);

    for &(y0, y1, fy) in &ys {
        let row0 = &src[y0 * stride..(y0 + 1) * stride];
        let row1 = &src[y1 * stride..(y1 + 1) * stride];
        for &(x0, x1, fx) in &xs {
            for c in 0..channels {
                let a = row0[x0 * channels + c];
                let b = row0[x1 * channels + c];
                let d = row1[x0 * channels + c];
                let e = row1[x1 * channels + c];
                let top = a + (b - a) * fx;
                let bottom = d + (e - d) * fx;
                out.push(top + (bottom - top) * fy);
            }
        }
    }
    Ok(out)
}

/// Per destination index: the two source indices and the weight of the second.
fn taps(src_len: u32, dst_len: u32) -> Vec<(usize, usize, f32)> {
    let scale = src_len as f64 / dst_len as f64;
    let last = src_len as usize - 1;
    (0..dst_len)
        .map(|d| {
            let s = (d as f64 + 0.5) * scale - 0.5;
            let floor = s.floor();
            if floor < 0.0 {
                return (0, 0, 0.0);
            }
            let i = floor as usize;
            if i >= last {
                return (last, last, 0.0);
            }
            (i, i + 1, (s - floor) as f32)
        })
        .collect()
}

impl ImageBuf {
    pub fn resize(&self, width: u32, height: u32) -> Result<ImageBuf> {
        if self.width == width && self.height == height {
            return Ok(self.clone());
        }
        let data = resize_linear(&self.data, self.width, self.height, 3, width, height)?;
        ImageBuf::from_data(width, height, data)
    }
}

impl Plane {
    pub fn resize(&self, width: u32, height: u32) -> Result<Plane> {
        if self.width == width && self.height == height {
            return Ok(self.clone());
        }
        let data = resize_linear(&self.data, self.width, self.height, 1, width, height)?;
        Plane::from_data(width, height, data)
    }
}
