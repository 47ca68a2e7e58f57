use bibnumber_core::{BoundingBox, RgbImageView};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::chains::{build_chains, TextChain};
use crate::components::extract_components;
use crate::filter::{filter_components, FilteredComponent};
use crate::preprocess::{preprocess, Preprocessed};
use crate::swt::{stroke_width_transform, StrokeWidthMap};
use crate::TextDetectionParams;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Per-stage counts of one detection run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDetectionStats {
    pub width: usize,
    pub height: usize,
    pub edge_pixels: usize,
    pub rays: usize,
    pub stroke_pixels: usize,
    pub raw_components: usize,
    pub filtered_components: usize,
    pub seed_chains: usize,
    pub merge_passes: usize,
}

/// Detector output.
///
/// Chain member indices point into `component_boxes`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub chains: Vec<TextChain>,
    pub component_boxes: Vec<BoundingBox>,
    pub chain_boxes: Vec<BoundingBox>,
    pub stats: TextDetectionStats,
}

impl TextDetection {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

/// Intermediate products, for inspection and tests.
#[derive(Clone, Debug, Default)]
pub struct TextDetectionDebug {
    pub preprocessed: Option<Preprocessed>,
    pub stroke_widths: Option<StrokeWidthMap>,
    pub components: Vec<FilteredComponent>,
}

/// Stroke width transform text detector.
#[derive(Clone, Debug, Default)]
pub struct TextDetector {
    params: TextDetectionParams,
}

impl TextDetector {
    pub fn new(params: TextDetectionParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &TextDetectionParams {
        &self.params
    }

    /// Find text chains in `image`. Empty images give an empty result.
    pub fn detect(&self, image: &RgbImageView<'_>) -> TextDetection {
        self.detect_with_debug(image).0
    }

    /// Like [`detect`](Self::detect), also returning the intermediate stages.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image),
            fields(width = image.width, height = image.height)
        )
    )]
    pub fn detect_with_debug(
        &self,
        image: &RgbImageView<'_>,
    ) -> (TextDetection, TextDetectionDebug) {
        let mut stats = TextDetectionStats {
            width: image.width,
            height: image.height,
            ..TextDetectionStats::default()
        };
        if image.is_empty() {
            debug!("detect: empty image {}x{}", image.width, image.height);
            return (
                TextDetection {
                    stats,
                    ..TextDetection::default()
                },
                TextDetectionDebug::default(),
            );
        }

        let pre = preprocess(image);
        stats.edge_pixels = pre.edge_count();

        let (stroke_widths, rays) = stroke_width_transform(&pre, &self.params);
        stats.rays = rays;
        stats.stroke_pixels = stroke_widths.stroke_pixel_count();

        let raw = extract_components(&stroke_widths);
        stats.raw_components = raw.len();

        let components = filter_components(raw, &pre.smoothed, &self.params);
        stats.filtered_components = components.len();

        let (chains, chain_stats) = build_chains(&components, self.params.min_chain_len);
        stats.seed_chains = chain_stats.seeds;
        stats.merge_passes = chain_stats.merge_passes;

        let component_boxes = components.iter().map(|c| c.bbox).collect();
        let chain_boxes = chains.iter().map(|c| c.bbox).collect();

        info!(
            "detect {}x{}: edges={} components={}/{} chains={}",
            image.width,
            image.height,
            stats.edge_pixels,
            stats.filtered_components,
            stats.raw_components,
            chains.len()
        );

        (
            TextDetection {
                chains,
                component_boxes,
                chain_boxes,
                stats,
            },
            TextDetectionDebug {
                preprocessed: Some(pre),
                stroke_widths: Some(stroke_widths),
                components,
            },
        )
    }
}

/// One-shot detection with explicit parameters.
pub fn detect(image: &RgbImageView<'_>, params: &TextDetectionParams) -> TextDetection {
    TextDetector::new(params.clone()).detect(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_image_is_a_normal_empty_result() {
        let view = RgbImageView::packed_rgb(0, 7, &[]).unwrap();
        let det = detect(&view, &TextDetectionParams::default());
        assert!(det.is_empty());
        assert!(det.component_boxes.is_empty());
        assert_eq!(det.stats.height, 7);
    }

    #[test]
    fn detector_keeps_its_params() {
        let params = TextDetectionParams {
            min_chain_len: 5,
            ..TextDetectionParams::default()
        };
        let detector = TextDetector::new(params.clone());
        assert_eq!(detector.params(), &params);
    }
}
