//! Per-component statistics and geometric filtering.

use std::f32::consts::PI;

use bibnumber_core::{ratio_within, BoundingBox, GrayImage};
use log::debug;
use nalgebra::{Point2, Vector2};

use crate::components::Component;
use crate::params::{ContainmentPolicy, TextDetectionParams};
use crate::swt::PixelSample;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Accepted range of `length / width` of the minimum-area rectangle.
pub const MAX_ASPECT_RATIO: f32 = 4.0;

/// Rotation sweep: `k * PI / 36` for `k = 1..=17`, i.e. 5° steps below 90°.
const SWEEP_STEP: f32 = PI / 36.0;
const SWEEP_STEPS: usize = 17;

/// Mean, population variance and upper median of stroke widths and of the
/// smoothed intensities under the component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComponentStats {
    pub mean: f32,
    pub variance: f32,
    pub median: f32,
    pub intensity_mean: f32,
    pub intensity_variance: f32,
    pub intensity_median: f32,
    pub bbox: BoundingBox,
}

/// A component that passed every geometric test.
#[derive(Clone, Debug, PartialEq)]
pub struct FilteredComponent {
    pub pixels: Vec<PixelSample>,
    pub bbox: BoundingBox,
    /// Midpoint of the bounding box.
    pub center: Point2<f32>,
    /// Inclusive bounding box extents `(width, height)`.
    pub dimensions: Vector2<f32>,
    pub median_stroke: f32,
    pub stats: ComponentStats,
    /// Minimum-area rectangle `(length, width)` from the rotation sweep.
    pub rotated_extent: Vector2<f32>,
    /// Number of other survivors whose center lies strictly inside `bbox`.
    pub contained: usize,
}

fn mean_variance_median(values: &mut [f32]) -> (f32, f32, f32) {
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    values.sort_by(f32::total_cmp);
    let median = values[values.len() / 2];
    (mean, variance, median)
}

/// Statistics of a component; `None` for an empty component.
pub fn component_stats(component: &Component, smoothed: &GrayImage) -> Option<ComponentStats> {
    let bbox = BoundingBox::from_points(component.pixels.iter().map(|p| (p.x, p.y)))?;
    let mut widths: Vec<f32> = component.pixels.iter().map(|p| p.value).collect();
    let mut intensities: Vec<f32> = component
        .pixels
        .iter()
        .map(|p| smoothed.get(p.x as usize, p.y as usize) as f32)
        .collect();

    let (mean, variance, median) = mean_variance_median(&mut widths);
    let (intensity_mean, intensity_variance, intensity_median) =
        mean_variance_median(&mut intensities);
    Some(ComponentStats {
        mean,
        variance,
        median,
        intensity_mean,
        intensity_variance,
        intensity_median,
        bbox,
    })
}

/// Smallest-area `(length, width)` over the axis-aligned box and 17 rotations.
pub fn min_area_rect(pixels: &[PixelSample], bbox: &BoundingBox) -> Vector2<f32> {
    let mut best = Vector2::new(bbox.width() as f32, bbox.height() as f32);
    let mut best_area = best.x * best.y;

    for k in 1..=SWEEP_STEPS {
        let (sin, cos) = (k as f32 * SWEEP_STEP).sin_cos();
        let (mut x_min, mut x_max) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut y_min, mut y_max) = (f32::INFINITY, f32::NEG_INFINITY);
        for p in pixels {
            let (x, y) = (p.x as f32, p.y as f32);
            let xr = x * cos - y * sin;
            let yr = x * sin + y * cos;
            x_min = x_min.min(xr);
            x_max = x_max.max(xr);
            y_min = y_min.min(yr);
            y_max = y_max.max(yr);
        }
        let length = x_max - x_min + 1.0;
        let width = y_max - y_min + 1.0;
        if length * width < best_area {
            best = Vector2::new(length, width);
            best_area = length * width;
        }
    }
    best
}

/// Reason a component was dropped; used for debug accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    TooTall,
    TooShort,
    AboveTopBorder,
    BelowBottomBorder,
    StrokeVariance,
    AspectRatio,
}

/// Apply the per-component tests to one component.
pub fn check_component(
    component: Component,
    smoothed: &GrayImage,
    params: &TextDetectionParams,
) -> Result<FilteredComponent, Rejection> {
    let Some(stats) = component_stats(&component, smoothed) else {
        return Err(Rejection::TooShort);
    };
    let bbox = stats.bbox;
    let height = bbox.height();
    if height > params.max_character_height {
        return Err(Rejection::TooTall);
    }
    if height < params.min_character_height {
        return Err(Rejection::TooShort);
    }
    if bbox.min_y < params.top_border {
        return Err(Rejection::AboveTopBorder);
    }
    if bbox.max_y > smoothed.height as i32 - params.bottom_border {
        return Err(Rejection::BelowBottomBorder);
    }
    if let Some(ratio) = params.max_variance_ratio {
        if stats.variance > ratio * stats.mean {
            return Err(Rejection::StrokeVariance);
        }
    }

    let rotated_extent = min_area_rect(&component.pixels, &bbox);
    if !ratio_within(rotated_extent.x, rotated_extent.y, MAX_ASPECT_RATIO) {
        return Err(Rejection::AspectRatio);
    }

    Ok(FilteredComponent {
        pixels: component.pixels,
        bbox,
        center: bbox.center(),
        dimensions: Vector2::new(bbox.width() as f32, bbox.height() as f32),
        median_stroke: stats.median,
        stats,
        rotated_extent,
        contained: 0,
    })
}

/// Filter components, count containment and apply the containment policy.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(components = components.len()))
)]
pub fn filter_components(
    components: Vec<Component>,
    smoothed: &GrayImage,
    params: &TextDetectionParams,
) -> Vec<FilteredComponent> {
    let total = components.len();
    let mut rejected = [0usize; 6];
    let mut kept = Vec::new();
    for component in components {
        match check_component(component, smoothed, params) {
            Ok(c) => kept.push(c),
            Err(reason) => rejected[reason as usize] += 1,
        }
    }

    let counts = containment_counts(&kept);
    for (c, n) in kept.iter_mut().zip(counts) {
        c.contained = n;
    }
    let before_policy = kept.len();
    let kept = apply_containment_policy(kept, params.containment);

    debug!(
        "filter: {} -> {} (tall={} short={} top={} bottom={} variance={} aspect={}), containment dropped {}",
        total,
        kept.len(),
        rejected[Rejection::TooTall as usize],
        rejected[Rejection::TooShort as usize],
        rejected[Rejection::AboveTopBorder as usize],
        rejected[Rejection::BelowBottomBorder as usize],
        rejected[Rejection::StrokeVariance as usize],
        rejected[Rejection::AspectRatio as usize],
        before_policy - kept.len()
    );
    kept
}

/// For every component, how many other components have their center
/// strictly inside its bounding box.
pub fn containment_counts(components: &[FilteredComponent]) -> Vec<usize> {
    components
        .iter()
        .enumerate()
        .map(|(i, outer)| {
            components
                .iter()
                .enumerate()
                .filter(|&(j, inner)| j != i && outer.bbox.strictly_contains_point(&inner.center))
                .count()
        })
        .collect()
}

/// Remove components according to `policy`. Order of survivors is kept.
pub fn apply_containment_policy(
    components: Vec<FilteredComponent>,
    policy: ContainmentPolicy,
) -> Vec<FilteredComponent> {
    match policy {
        ContainmentPolicy::KeepAll => components,
        ContainmentPolicy::DropCrowded { max_contained } => components
            .into_iter()
            .filter(|c| c.contained <= max_contained)
            .collect(),
        ContainmentPolicy::DropNested => {
            let nested: Vec<bool> = components
                .iter()
                .enumerate()
                .map(|(j, inner)| {
                    components.iter().enumerate().any(|(i, outer)| {
                        i != j
                            && outer.bbox.contains_box(&inner.bbox)
                            && outer.bbox.area() > inner.bbox.area()
                    })
                })
                .collect();
            components
                .into_iter()
                .zip(nested)
                .filter_map(|(c, is_nested)| (!is_nested).then_some(c))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect_component(x0: i32, y0: i32, w: i32, h: i32, stroke: f32) -> Component {
        let mut pixels = Vec::new();
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                pixels.push(PixelSample { x, y, value: stroke });
            }
        }
        Component { pixels }
    }

    fn frame_component(x0: i32, y0: i32, w: i32, h: i32, t: i32) -> Component {
        let mut pixels = Vec::new();
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                let inside = x >= x0 + t && x < x0 + w - t && y >= y0 + t && y < y0 + h - t;
                if !inside {
                    pixels.push(PixelSample {
                        x,
                        y,
                        value: t as f32,
                    });
                }
            }
        }
        Component { pixels }
    }

    fn canvas() -> GrayImage {
        GrayImage::filled(200, 400, 128)
    }

    #[test]
    fn stats_are_population_moments() {
        let comp = Component {
            pixels: [2.0, 4.0, 4.0, 6.0]
                .iter()
                .enumerate()
                .map(|(i, &value)| PixelSample {
                    x: i as i32,
                    y: 3,
                    value,
                })
                .collect(),
        };
        let stats = component_stats(&comp, &canvas()).unwrap();
        assert_relative_eq!(stats.mean, 4.0);
        assert_relative_eq!(stats.variance, 2.0);
        assert_relative_eq!(stats.median, 4.0);
        assert_relative_eq!(stats.intensity_mean, 128.0);
        assert_relative_eq!(stats.intensity_variance, 0.0);
        assert_eq!(stats.bbox, BoundingBox::new(0, 3, 3, 3));
    }

    #[test]
    fn accepts_character_shaped_component() {
        let params = TextDetectionParams::default();
        let c = check_component(rect_component(20, 30, 10, 30, 4.0), &canvas(), &params).unwrap();
        assert_eq!(c.bbox, BoundingBox::new(20, 30, 29, 59));
        assert_relative_eq!(c.center.x, 24.5);
        assert_relative_eq!(c.center.y, 44.5);
        assert_relative_eq!(c.dimensions.x, 10.0);
        assert_relative_eq!(c.dimensions.y, 30.0);
        assert_relative_eq!(c.rotated_extent.x, 10.0);
        assert_relative_eq!(c.rotated_extent.y, 30.0);
        assert_relative_eq!(c.median_stroke, 4.0);
    }

    #[test]
    fn geometric_rejections() {
        let params = TextDetectionParams::default();
        let img = canvas();
        let check = |c| check_component(c, &img, &params).err();
        assert_eq!(check(rect_component(10, 10, 5, 40, 2.0)), Some(Rejection::AspectRatio));
        assert_eq!(check(rect_component(10, 10, 6, 8, 2.0)), Some(Rejection::TooShort));
        assert_eq!(check(rect_component(10, 10, 100, 310, 2.0)), Some(Rejection::TooTall));

        let bordered = TextDetectionParams {
            top_border: 20,
            bottom_border: 50,
            ..TextDetectionParams::default()
        };
        let check = |c| check_component(c, &img, &bordered).err();
        assert_eq!(check(rect_component(10, 10, 10, 20, 2.0)), Some(Rejection::AboveTopBorder));
        assert_eq!(
            check(rect_component(10, 340, 10, 20, 2.0)),
            Some(Rejection::BelowBottomBorder)
        );
        assert_eq!(check(rect_component(10, 300, 10, 20, 2.0)), None);
    }

    #[test]
    fn variance_gate_is_optional() {
        let mut comp = rect_component(10, 10, 10, 20, 2.0);
        comp.pixels[0].value = 40.0;
        let img = canvas();
        assert!(check_component(comp.clone(), &img, &TextDetectionParams::default()).is_ok());
        let strict = TextDetectionParams {
            max_variance_ratio: Some(0.5),
            ..TextDetectionParams::default()
        };
        assert_eq!(
            check_component(comp, &img, &strict).err(),
            Some(Rejection::StrokeVariance)
        );
    }

    #[test]
    fn rotation_sweep_finds_thin_diagonal() {
        let pixels: Vec<_> = (0..20)
            .map(|i| PixelSample {
                x: i,
                y: i,
                value: 1.0,
            })
            .collect();
        let bbox = BoundingBox::new(0, 0, 19, 19);
        let r = min_area_rect(&pixels, &bbox);
        assert!(r.x < 1.5, "length {}", r.x);
        assert!(r.y > 20.0 && r.y < 29.0, "width {}", r.y);
    }

    fn nested_pair() -> Vec<FilteredComponent> {
        let params = TextDetectionParams::default();
        let img = canvas();
        let outer = check_component(frame_component(50, 50, 30, 40, 3), &img, &params).unwrap();
        let inner = check_component(rect_component(55, 60, 6, 12, 3.0), &img, &params).unwrap();
        let mut comps = vec![outer, inner];
        let counts = containment_counts(&comps);
        for (c, n) in comps.iter_mut().zip(counts) {
            c.contained = n;
        }
        comps
    }

    #[test]
    fn containment_is_counted_but_kept_by_default() {
        let comps = nested_pair();
        assert_eq!(comps[0].contained, 1);
        assert_eq!(comps[1].contained, 0);
        let kept = apply_containment_policy(comps, ContainmentPolicy::KeepAll);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn nested_component_is_dropped_when_enabled() {
        let kept = apply_containment_policy(nested_pair(), ContainmentPolicy::DropNested);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].bbox, BoundingBox::new(50, 50, 79, 89));
    }

    #[test]
    fn crowded_component_is_dropped_when_enabled() {
        let kept = apply_containment_policy(
            nested_pair(),
            ContainmentPolicy::DropCrowded { max_contained: 0 },
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].bbox, BoundingBox::new(55, 60, 60, 71));
    }
}
