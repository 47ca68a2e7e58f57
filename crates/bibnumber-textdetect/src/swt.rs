//! Stroke width transform: ray casting and per-ray median correction.

use std::f32::consts::FRAC_PI_2;

use bibnumber_core::PlaneF32;
use log::debug;
use nalgebra::{Point2, Vector2};

use crate::preprocess::Preprocessed;
use crate::TextDetectionParams;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Distance advanced per ray step, in pixels.
pub const RAY_STEP: f32 = 0.05;

/// Stored width of pixels no valid ray crossed.
const NO_STROKE: f32 = -1.0;

/// Integer pixel with an attached value (stroke width).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelSample {
    pub x: i32,
    pub y: i32,
    pub value: f32,
}

/// A valid ray between two opposing edge pixels.
#[derive(Clone, Debug)]
pub struct Ray {
    pub start: (i32, i32),
    pub end: (i32, i32),
    pub length: f32,
    /// Traversed pixels, start and end included.
    pub points: Vec<PixelSample>,
}

/// Per-pixel stroke width; pixels without a stroke read as `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct StrokeWidthMap {
    plane: PlaneF32,
}

impl StrokeWidthMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            plane: PlaneF32::filled(width, height, NO_STROKE),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.plane.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.plane.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        let v = self.plane.get(x, y);
        (v >= 0.0).then_some(v)
    }

    /// Store `min(current, width)`; an unset pixel takes `width`.
    #[inline]
    pub fn set_min(&mut self, x: usize, y: usize, width: f32) {
        let i = self.plane.idx(x, y);
        let cur = self.plane.data[i];
        if cur < 0.0 || width < cur {
            self.plane.data[i] = width;
        }
    }

    /// Number of pixels carrying a stroke width.
    pub fn stroke_pixel_count(&self) -> usize {
        self.plane.data.iter().filter(|&&v| v >= 0.0).count()
    }

    /// `(x, y, width)` for every pixel with a stroke, in raster order.
    pub fn strokes(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        let w = self.plane.width;
        self.plane
            .data
            .iter()
            .enumerate()
            .filter(|(_, v)| **v >= 0.0)
            .map(move |(i, &v)| (i % w, i / w, v))
    }
}

/// Full transform: cast every ray, then apply the median correction.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(pre, params), fields(edges = pre.edge_count()))
)]
pub fn stroke_width_transform(
    pre: &Preprocessed,
    params: &TextDetectionParams,
) -> (StrokeWidthMap, usize) {
    let (mut map, mut rays) = cast_rays(pre, params);
    median_filter(&mut map, &mut rays);
    debug!(
        "swt: rays={} stroke_pixels={}",
        rays.len(),
        map.stroke_pixel_count()
    );
    (map, rays.len())
}

/// Cast a ray from every edge pixel and record the widths of valid rays.
pub fn cast_rays(pre: &Preprocessed, params: &TextDetectionParams) -> (StrokeWidthMap, Vec<Ray>) {
    let (w, h) = (pre.width(), pre.height());
    let mut map = StrokeWidthMap::new(w, h);
    let mut rays = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if !pre.is_edge(x, y) {
                continue;
            }
            let Some(dir) = ray_direction(pre, x, y, params.dark_on_light) else {
                continue;
            };
            if let Some(ray) = trace_ray(pre, x, y, dir, params) {
                for p in &ray.points {
                    map.set_min(p.x as usize, p.y as usize, ray.length);
                }
                rays.push(ray);
            }
        }
    }
    (map, rays)
}

/// Unit gradient at `(x, y)`, negated for dark-on-light text.
fn ray_direction(
    pre: &Preprocessed,
    x: usize,
    y: usize,
    dark_on_light: bool,
) -> Option<Vector2<f32>> {
    let g = Vector2::new(pre.grad_x.get(x, y), pre.grad_y.get(x, y));
    let mag = g.norm();
    if mag <= 0.0 || !mag.is_finite() {
        return None;
    }
    let sign = if dark_on_light { -1.0 } else { 1.0 };
    Some(g * (sign / mag))
}

fn trace_ray(
    pre: &Preprocessed,
    x0: usize,
    y0: usize,
    dir: Vector2<f32>,
    params: &TextDetectionParams,
) -> Option<Ray> {
    let (w, h) = (pre.width() as i32, pre.height() as i32);
    let (sx, sy) = (x0 as i32, y0 as i32);
    // Past this distance no later pixel can come back under the limit.
    let give_up = params.max_stroke_length + 2.0;

    let mut cur = Point2::new(x0 as f32 + 0.5, y0 as f32 + 0.5);
    let (mut px, mut py) = (sx, sy);
    let mut points = vec![PixelSample {
        x: sx,
        y: sy,
        value: 0.0,
    }];

    loop {
        cur += dir * RAY_STEP;
        let cx = cur.x.floor() as i32;
        let cy = cur.y.floor() as i32;
        if cx == px && cy == py {
            continue;
        }
        px = cx;
        py = cy;
        if cx < 0 || cy < 0 || cx >= w || cy >= h {
            return None;
        }
        points.push(PixelSample {
            x: cx,
            y: cy,
            value: 0.0,
        });

        let length = ((cx - sx) as f32).hypot((cy - sy) as f32);
        if pre.is_edge(cx as usize, cy as usize) {
            // The first edge pixel ends the ray whether or not it is accepted.
            let end_dir = ray_direction(pre, cx as usize, cy as usize, params.dark_on_light)?;
            let cos = dir.dot(&-end_dir).clamp(-1.0, 1.0);
            if cos.acos() >= FRAC_PI_2 || length > params.max_stroke_length {
                return None;
            }
            return Some(Ray {
                start: (sx, sy),
                end: (cx, cy),
                length,
                points,
            });
        }
        if length > give_up {
            return None;
        }
    }
}

/// Clamp every ray pixel to the median width along its ray.
///
/// Widths are re-read from `map` so earlier corrections are visible to later
/// rays; a stored width never increases.
pub fn median_filter(map: &mut StrokeWidthMap, rays: &mut [Ray]) {
    let mut widths = Vec::new();
    for ray in rays.iter_mut() {
        if ray.points.is_empty() {
            continue;
        }
        widths.clear();
        for p in ray.points.iter_mut() {
            p.value = map.get(p.x as usize, p.y as usize).unwrap_or(ray.length);
            widths.push(p.value);
        }
        widths.sort_by(f32::total_cmp);
        let median = widths[widths.len() / 2];
        for p in &ray.points {
            map.set_min(p.x as usize, p.y as usize, median);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibnumber_core::GrayImage;

    /// Preprocessed stand-in with explicit edge pixels and gradients.
    fn synthetic(w: usize, h: usize, edges: &[(usize, usize, f32, f32)]) -> Preprocessed {
        let mut mask = GrayImage::new(w, h);
        let mut gx = PlaneF32::new(w, h);
        let mut gy = PlaneF32::new(w, h);
        for &(x, y, dx, dy) in edges {
            mask.set(x, y, 255);
            gx.set(x, y, dx);
            gy.set(x, y, dy);
        }
        Preprocessed {
            gray: GrayImage::filled(w, h, 255),
            smoothed: GrayImage::filled(w, h, 255),
            edges: mask,
            grad_x: gx,
            grad_y: gy,
            canny_low: 0.0,
            canny_high: 0.0,
        }
    }

    /// Dark bar between columns 5 and 10; gradients point outward.
    fn bar_edges(rows: usize) -> Vec<(usize, usize, f32, f32)> {
        (0..rows)
            .flat_map(|y| [(5, y, -2.0, 0.0), (10, y, 2.0, 0.0)])
            .collect()
    }

    #[test]
    fn opposing_edges_produce_bar_width() {
        let pre = synthetic(20, 5, &bar_edges(5));
        let params = TextDetectionParams::default();
        let (map, rays) = cast_rays(&pre, &params);
        assert_eq!(rays.len(), 10);
        for y in 0..5 {
            for x in 0..20 {
                let expected = (5..=10).contains(&x).then_some(5.0);
                assert_eq!(map.get(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn rays_longer_than_limit_are_dropped() {
        let pre = synthetic(20, 5, &bar_edges(5));
        let params = TextDetectionParams {
            max_stroke_length: 4.0,
            ..TextDetectionParams::default()
        };
        let (map, rays) = cast_rays(&pre, &params);
        assert!(rays.is_empty());
        assert_eq!(map.stroke_pixel_count(), 0);
    }

    #[test]
    fn parallel_gradients_do_not_form_a_stroke() {
        let edges: Vec<_> = (0..5)
            .flat_map(|y| [(5, y, -2.0, 0.0), (10, y, -2.0, 0.0)])
            .collect();
        let pre = synthetic(20, 5, &edges);
        let (map, rays) = cast_rays(&pre, &TextDetectionParams::default());
        assert!(rays.is_empty());
        assert_eq!(map.stroke_pixel_count(), 0);
    }

    #[test]
    fn light_on_dark_follows_the_gradient() {
        // Bright bar: gradients point inward.
        let edges: Vec<_> = (0..3)
            .flat_map(|y| [(5, y, 1.0, 0.0), (9, y, -1.0, 0.0)])
            .collect();
        let pre = synthetic(16, 3, &edges);
        let params = TextDetectionParams {
            dark_on_light: false,
            ..TextDetectionParams::default()
        };
        let (map, _) = cast_rays(&pre, &params);
        assert_eq!(map.get(7, 1), Some(4.0));
        assert_eq!(map.get(4, 1), None);
    }

    #[test]
    fn median_correction_only_decreases() {
        let mut map = StrokeWidthMap::new(4, 1);
        map.set_min(0, 0, 5.0);
        map.set_min(1, 0, 5.0);
        map.set_min(2, 0, 20.0);
        let mut rays = vec![Ray {
            start: (0, 0),
            end: (2, 0),
            length: 20.0,
            points: (0..3)
                .map(|x| PixelSample {
                    x,
                    y: 0,
                    value: 0.0,
                })
                .collect(),
        }];
        let before = map.clone();
        median_filter(&mut map, &mut rays);
        assert_eq!(map.get(2, 0), Some(5.0));
        for x in 0..4 {
            match (before.get(x, 0), map.get(x, 0)) {
                (Some(b), Some(a)) => assert!(a <= b),
                (None, None) => {}
                other => panic!("stroke presence changed at {x}: {other:?}"),
            }
        }
    }

    #[test]
    fn recorded_widths_are_positive_and_bounded() {
        let mut edges = bar_edges(6);
        edges.push((2, 2, 0.0, 0.0));
        let pre = synthetic(24, 6, &edges);
        let params = TextDetectionParams::default();
        let (map, _) = stroke_width_transform(&pre, &params);
        assert!(map.stroke_pixel_count() > 0);
        for (_, _, w) in map.strokes() {
            assert!(w > 0.0 && w <= params.max_stroke_length, "width {w}");
        }
    }
}
