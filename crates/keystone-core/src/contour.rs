//! Outer border extraction on binary masks.
//!
//! Foreground is 8-connected and background 4-connected. Only components
//! that touch the background surrounding the image are reported; blobs
//! sitting inside another blob's hole are skipped. Each border is traced
//! with Suzuki-Abe border following from the component's first pixel in
//! raster order, then straight runs are collapsed to their endpoints.

use std::collections::VecDeque;

use crate::geometry::Point;
use crate::image_buf::Plane;

/// Integer pixel coordinate on a border.
pub type PixelPoint = (i32, i32);

/// Neighbor offsets, counterclockwise on screen (y grows downward), starting east.
const NEIGHBORS: [PixelPoint; 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

const WEST: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    pub points: Vec<PixelPoint>,
}

impl Contour {
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    pub fn moments(&self) -> Moments {
        Moments::of_polygon(&self.points)
    }
}

struct Mask<'a> {
    width: i32,
    height: i32,
    data: &'a [f32],
}

impl Mask<'_> {
    fn is_set(&self, (x, y): PixelPoint) -> bool {
        x >= 0
            && y >= 0
            && x < self.width
            && y < self.height
            && self.data[(y * self.width + x) as usize] != 0.0
    }

    fn index(&self, (x, y): PixelPoint) -> usize {
        (y * self.width + x) as usize
    }
}

/// Find the outer borders of all external blobs in `mask` (non-zero = set).
pub fn find_external_contours(mask: &Plane) -> Vec<Contour> {
    let m = Mask {
        width: mask.width as i32,
        height: mask.height as i32,
        data: &mask.data,
    };
    let outside = outer_background(&m);
    let mut labeled = vec![false; mask.data.len()];
    let mut contours = Vec::new();

    for y in 0..m.height {
        for x in 0..m.width {
            let p = (x, y);
            let idx = m.index(p);
            if labeled[idx] || !m.is_set(p) {
                continue;
            }
            let external = flood_component(&m, p, &mut labeled, &outside);
            if external {
                contours.push(Contour {
                    points: compress_runs(trace_border(&m, p)),
                });
            }
        }
    }
    contours
}

/// Background pixels 4-connected to the frame around the image.
fn outer_background(m: &Mask) -> Vec<bool> {
    let mut outside = vec![false; m.data.len()];
    let mut queue = VecDeque::new();
    let seed = |p: PixelPoint, outside: &mut Vec<bool>, queue: &mut VecDeque<PixelPoint>| {
        let idx = m.index(p);
        if !m.is_set(p) && !outside[idx] {
            outside[idx] = true;
            queue.push_back(p);
        }
    };
    for x in 0..m.width {
        seed((x, 0), &mut outside, &mut queue);
        seed((x, m.height - 1), &mut outside, &mut queue);
    }
    for y in 0..m.height {
        seed((0, y), &mut outside, &mut queue);
        seed((m.width - 1, y), &mut outside, &mut queue);
    }
    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let q = (x + dx, y + dy);
            if q.0 < 0 || q.1 < 0 || q.0 >= m.width || q.1 >= m.height {
                continue;
            }
            seed(q, &mut outside, &mut queue);
        }
    }
    outside
}

/// Label the 8-connected component containing `start`. Returns whether it
/// borders the outer background (or the image edge).
fn flood_component(m: &Mask, start: PixelPoint, labeled: &mut [bool], outside: &[bool]) -> bool {
    let mut external = false;
    let mut queue = VecDeque::from([start]);
    labeled[m.index(start)] = true;
    while let Some((x, y)) = queue.pop_front() {
        if x == 0 || y == 0 || x == m.width - 1 || y == m.height - 1 {
            external = true;
        }
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let q = (x + dx, y + dy);
            if q.0 >= 0 && q.1 >= 0 && q.0 < m.width && q.1 < m.height && outside[m.index(q)] {
                external = true;
            }
        }
        for (dx, dy) in NEIGHBORS {
            let q = (x + dx, y + dy);
            if m.is_set(q) && !labeled[m.index(q)] {
                labeled[m.index(q)] = true;
                queue.push_back(q);
            }
        }
    }
    external
}

fn direction(from: PixelPoint, to: PixelPoint) -> usize {
    let delta = (to.0 - from.0, to.1 - from.1);
    NEIGHBORS
        .iter()
        .position(|&d| d == delta)
        .unwrap_or(WEST)
}

/// Follow the outer border starting at `start`, whose west neighbor is background.
fn trace_border(m: &Mask, start: PixelPoint) -> Vec<PixelPoint> {
    let step = |p: PixelPoint, d: usize| (p.0 + NEIGHBORS[d].0, p.1 + NEIGHBORS[d].1);

    // Clockwise from west for the first set neighbor.
    let first = (0..8)
        .map(|k| (WEST + 8 - k) % 8)
        .map(|d| step(start, d))
        .find(|&q| m.is_set(q));
    let Some(first) = first else {
        return vec![start];
    };

    let mut points = Vec::new();
    let mut prev = first;
    let mut cur = start;
    loop {
        // Counterclockwise from just past the previous point.
        let back = direction(cur, prev);
        let next = (1..=8)
            .map(|k| step(cur, (back + k) % 8))
            .find(|&q| m.is_set(q))
            .unwrap_or(prev);
        points.push(cur);
        if next == start && cur == first {
            break;
        }
        prev = cur;
        cur = next;
    }
    points
}

/// Drop points lying in the middle of a horizontal, vertical or diagonal run.
fn compress_runs(points: Vec<PixelPoint>) -> Vec<PixelPoint> {
    let n = points.len();
    if n < 3 {
        return points;
    }
    let delta = |a: PixelPoint, b: PixelPoint| (b.0 - a.0, b.1 - a.1);
    let kept: Vec<PixelPoint> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            delta(prev, points[i]) != delta(points[i], next)
        })
        .map(|i| points[i])
        .collect();
    if kept.is_empty() { points } else { kept }
}

/// Absolute shoelace area of a closed polygon.
pub fn polygon_area(points: &[PixelPoint]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];
            x0 as f64 * y1 as f64 - x1 as f64 * y0 as f64
        })
        .sum();
    (twice / 2.0).abs()
}

/// Spatial moments of a polygon, up to first order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    /// Green's theorem over the closed polygon. Sign follows orientation,
    /// which cancels in the centroid.
    pub fn of_polygon(points: &[PixelPoint]) -> Self {
        let n = points.len();
        if n < 3 {
            return Self::default();
        }
        let mut m = Self::default();
        for i in 0..n {
            let (x0, y0) = (points[i].0 as f64, points[i].1 as f64);
            let (x1, y1) = (
                points[(i + 1) % n].0 as f64,
                points[(i + 1) % n].1 as f64,
            );
            let cross = x0 * y1 - x1 * y0;
            m.m00 += cross;
            m.m10 += (x0 + x1) * cross;
            m.m01 += (y0 + y1) * cross;
        }
        m.m00 /= 2.0;
        m.m10 /= 6.0;
        m.m01 /= 6.0;
        m
    }

    pub fn centroid(&self) -> Option<Point> {
        if self.m00 == 0.0 {
            return None;
        }
        Some(Point::new(self.m10 / self.m00, self.m01 / self.m00))
    }
}
