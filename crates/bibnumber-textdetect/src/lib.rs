//! Stroke width transform (SWT) text-region detector.
//!
//! The detector turns a color photograph into *chains*: runs of
//! character-like components lying on a near-horizontal line, each with a
//! bounding box ready for an OCR stage.
//!
//! Stages, each a plain function over the previous stage's output:
//!
//! 1. [`preprocess`]: grayscale, edge-preserving smoothing, Canny edges with
//!    thresholds derived from the intensity median, Scharr gradients.
//! 2. [`stroke_width_transform`]: rays between opposing edges, then a per-ray
//!    median correction.
//! 3. [`extract_components`]: union-find over stroke pixels with similar
//!    widths.
//! 4. [`filter_components`]: size, border, aspect and containment tests.
//! 5. [`build_chains`]: pairwise seeds merged along shared endpoints.
//!
//! ```no_run
//! use bibnumber_core::RgbImageView;
//! use bibnumber_textdetect::{TextDetectionParams, TextDetector};
//!
//! # fn run(width: usize, height: usize, rgb: &[u8]) -> Result<(), bibnumber_core::ImageError> {
//! let view = RgbImageView::packed_rgb(width, height, rgb)?;
//! let detector = TextDetector::new(TextDetectionParams::for_image_height(height));
//! for chain in detector.detect(&view).chains {
//!     println!("{:?} ({} components)", chain.bbox, chain.components.len());
//! }
//! # Ok(())
//! # }
//! ```

mod chains;
mod components;
mod detector;
mod filter;
mod params;
mod preprocess;
mod swt;

pub use chains::{
    build_chains, chain_bbox, finalize_chains, merge_chains, pair_chains, Chain, ChainStats,
    TextChain,
};
pub use components::{connects_diagonal, connects_orthogonal, extract_components, Component};
pub use detector::{detect, TextDetection, TextDetectionDebug, TextDetectionStats, TextDetector};
pub use filter::{
    apply_containment_policy, check_component, component_stats, containment_counts,
    filter_components, min_area_rect, ComponentStats, FilteredComponent, Rejection,
};
pub use params::{ContainmentPolicy, TextDetectionParams};
pub use preprocess::{
    auto_canny_thresholds, detect_edges, edge_preserving_smoothing, histogram_median, preprocess,
    Preprocessed,
};
pub use swt::{cast_rays, median_filter, stroke_width_transform, PixelSample, Ray, StrokeWidthMap};
