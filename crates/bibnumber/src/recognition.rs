//! Hand-off from detected chains to an OCR engine.
//!
//! The detector reports every line-like chain it finds. Before a chain is worth
//! an OCR call it has to be wide enough relative to the photograph and every
//! member has to be tall enough to hold a legible digit. Accepted chains are
//! normalized to a left-to-right direction and carry the deskew angle.

use bibnumber_core::BoundingBox;
use bibnumber_textdetect::{TextDetection, TextDetectionParams};
use log::debug;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::correction::parse_bib_number;

/// One chain ready for OCR.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcrRegion {
    /// Index into `TextDetection::chains`.
    pub chain_index: usize,
    pub bbox: BoundingBox,
    /// Member component boxes, in chain order.
    pub component_boxes: Vec<BoundingBox>,
    /// Unit text direction with `x >= 0`.
    pub direction: Vector2<f32>,
    /// `atan2(direction.y, direction.x)` in degrees, within `[-90, 90]`.
    pub angle_deg: f32,
    /// Rotation pivot: midpoint of the chain box.
    pub center: Point2<f32>,
}

impl OcrRegion {
    #[inline]
    pub fn len(&self) -> usize {
        self.component_boxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.component_boxes.is_empty()
    }
}

/// Why a chain was not handed to OCR.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum ChainRejection {
    /// Chain box narrower than `image_width / max_img_width_to_text_ratio`.
    TooNarrow { width: i32, min_width: f32 },
    /// Some member (or the chain box) is shorter than `min_character_height`.
    ComponentTooShort { height: i32, min_height: i32 },
    /// `|angle|` above `max_angle`; only with [`OcrGateOptions::enforce_max_angle`].
    AngleTooSteep { angle_deg: f32, max_angle: f32 },
    /// Short chain refused by the verification model.
    FailedVerification { len: usize },
}

/// Optional checks on top of the default gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrGateOptions {
    /// Reject chains steeper than `max_angle`. Off by default.
    pub enforce_max_angle: bool,
}

/// Gate decisions for every chain of one detection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrPlan {
    pub accepted: Vec<OcrRegion>,
    /// `(chain_index, reason)` pairs.
    pub rejected: Vec<(usize, ChainRejection)>,
}

/// Scores short chains that may be false positives.
///
/// Consulted for chains with `len <= model_verif_len_crit`.
pub trait ChainVerifier {
    fn verify(&mut self, region: &OcrRegion) -> bool;
}

impl<F> ChainVerifier for F
where
    F: FnMut(&OcrRegion) -> bool,
{
    fn verify(&mut self, region: &OcrRegion) -> bool {
        self(region)
    }
}

/// Run the default OCR gate over `detection`.
pub fn prepare_ocr_regions(
    detection: &TextDetection,
    image_width: usize,
    params: &TextDetectionParams,
) -> OcrPlan {
    prepare_ocr_regions_with(detection, image_width, params, &OcrGateOptions::default())
}

/// Like [`prepare_ocr_regions`] with extra checks.
pub fn prepare_ocr_regions_with(
    detection: &TextDetection,
    image_width: usize,
    params: &TextDetectionParams,
    options: &OcrGateOptions,
) -> OcrPlan {
    let min_width = image_width as f32 / params.max_img_width_to_text_ratio;
    let mut plan = OcrPlan::default();

    for (index, chain) in detection.chains.iter().enumerate() {
        let width = chain.bbox.max_x - chain.bbox.min_x;
        if (width as f32) < min_width {
            debug!("chain #{index}: width {width} < {min_width:.1}");
            plan.rejected
                .push((index, ChainRejection::TooNarrow { width, min_width }));
            continue;
        }

        let component_boxes: Vec<BoundingBox> = chain
            .components
            .iter()
            .filter_map(|&k| detection.component_boxes.get(k).copied())
            .collect();
        let min_height = component_boxes
            .iter()
            .map(|b| b.max_y - b.min_y)
            .fold(chain.bbox.max_y - chain.bbox.min_y, i32::min);
        if min_height < params.min_character_height {
            debug!(
                "chain #{index}: min height {min_height} < {}",
                params.min_character_height
            );
            plan.rejected.push((
                index,
                ChainRejection::ComponentTooShort {
                    height: min_height,
                    min_height: params.min_character_height,
                },
            ));
            continue;
        }

        let direction = if chain.direction.x < 0.0 {
            -chain.direction
        } else {
            chain.direction
        };
        let angle_deg = direction.y.atan2(direction.x).to_degrees();
        if options.enforce_max_angle && angle_deg.abs() > params.max_angle {
            plan.rejected.push((
                index,
                ChainRejection::AngleTooSteep {
                    angle_deg,
                    max_angle: params.max_angle,
                },
            ));
            continue;
        }

        plan.accepted.push(OcrRegion {
            chain_index: index,
            bbox: chain.bbox,
            component_boxes,
            direction,
            angle_deg,
            center: chain.bbox.center(),
        });
    }

    debug!(
        "ocr gate: {} accepted, {} rejected",
        plan.accepted.len(),
        plan.rejected.len()
    );
    plan
}

/// Pass short chains through `verifier`.
///
/// Short chains lower than `model_verif_min_height` are rejected without a
/// call. Chains longer than `model_verif_len_crit` are kept as they are.
pub fn verify_regions<V>(plan: &mut OcrPlan, params: &TextDetectionParams, verifier: &mut V)
where
    V: ChainVerifier + ?Sized,
{
    let mut kept = Vec::with_capacity(plan.accepted.len());
    for region in plan.accepted.drain(..) {
        if !params.needs_verification(region.len()) {
            kept.push(region);
            continue;
        }
        let tall_enough = region.bbox.max_y - region.bbox.min_y >= params.model_verif_min_height;
        if tall_enough && verifier.verify(&region) {
            kept.push(region);
        } else {
            plan.rejected.push((
                region.chain_index,
                ChainRejection::FailedVerification { len: region.len() },
            ));
        }
    }
    plan.accepted = kept;
    plan.rejected.sort_by_key(|(index, _)| *index);
}

/// Validate raw OCR strings and return the distinct bib numbers, ascending.
pub fn collect_bib_numbers<I, S>(texts: I) -> Vec<u32>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut numbers: Vec<u32> = texts
        .into_iter()
        .filter_map(|t| parse_bib_number(t.as_ref()))
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}
