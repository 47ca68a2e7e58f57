//! OCR input rendering and the recognizer seam.
//!
//! Each accepted chain is turned into a clean binary crop: every member is
//! Otsu-thresholded inside its own box and only its largest blob survives,
//! the result is rotated so the text line is horizontal, cropped, padded
//! and upscaled. Any engine implementing [`TextRecognizer`] can read it.

use ::image::imageops::{self, FilterType};
use ::image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::region_labelling::{connected_components, Connectivity};
use log::{debug, trace};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::core::{sample_bilinear, BoundingBox, GrayImageView};
use crate::correction::validate_bib_text;
use crate::recognition::{prepare_ocr_regions, verify_regions, ChainVerifier, OcrPlan, OcrRegion};
use crate::textdetect::{TextDetection, TextDetectionParams};

/// Blank margin added around the deskewed crop, in pixels.
pub const OCR_BORDER: u32 = 3;
/// Upscale factor applied after padding.
pub const OCR_UPSCALE: u32 = 3;

/// An OCR engine reading one prepared region.
///
/// `image` is white text on black, deskewed and upscaled.
pub trait TextRecognizer {
    fn recognize(&mut self, image: &GrayImage, region: &OcrRegion) -> Option<String>;
}

/// Binary mask of the largest blob inside `bbox`, in `bbox` coordinates.
fn component_mask(gray: &GrayImage, bbox: &BoundingBox, dark_on_light: bool) -> GrayImage {
    let roi = imageops::crop_imm(
        gray,
        bbox.min_x as u32,
        bbox.min_y as u32,
        bbox.width() as u32,
        bbox.height() as u32,
    )
    .to_image();
    let level = otsu_level(&roi);
    let binary = GrayImage::from_fn(roi.width(), roi.height(), |x, y| {
        let v = roi.get_pixel(x, y)[0];
        let fg = if dark_on_light { v <= level } else { v > level };
        Luma([if fg { 255 } else { 0 }])
    });

    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));
    let mut extents: Vec<Option<BoundingBox>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let l = label[0] as usize;
        if l == 0 {
            continue;
        }
        if extents.len() <= l {
            extents.resize(l + 1, None);
        }
        let (x, y) = (x as i32, y as i32);
        extents[l] = Some(match extents[l] {
            Some(bb) => bb.union(&BoundingBox::new(x, y, x, y)),
            None => BoundingBox::new(x, y, x, y),
        });
    }

    let mut best: Option<(usize, i64)> = None;
    for (l, bb) in extents.iter().enumerate() {
        if let Some(bb) = bb {
            if best.is_none_or(|(_, area)| bb.area() > area) {
                best = Some((l, bb.area()));
            }
        }
    }

    let mut mask = GrayImage::new(roi.width(), roi.height());
    if let Some((keep, _)) = best {
        for (x, y, label) in labels.enumerate_pixels() {
            if label[0] as usize == keep {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    mask
}

/// Rotation by `-angle` about `center`, the map that makes `direction`
/// horizontal.
struct Deskew {
    center: Point2<f32>,
    cos: f32,
    sin: f32,
}

impl Deskew {
    fn new(center: Point2<f32>, angle_deg: f32) -> Self {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        Self { center, cos, sin }
    }

    fn forward(&self, p: Point2<f32>) -> Point2<f32> {
        let d = p - self.center;
        self.center
            + Vector2::new(
                self.cos * d.x + self.sin * d.y,
                -self.sin * d.x + self.cos * d.y,
            )
    }

    fn inverse(&self, p: Point2<f32>) -> Point2<f32> {
        let d = p - self.center;
        self.center
            + Vector2::new(
                self.cos * d.x - self.sin * d.y,
                self.sin * d.x + self.cos * d.y,
            )
    }

    fn warp(&self, src: &GrayImage) -> GrayImage {
        let view = GrayImageView {
            width: src.width() as usize,
            height: src.height() as usize,
            data: src.as_raw(),
        };
        GrayImage::from_fn(src.width(), src.height(), |x, y| {
            let s = self.inverse(Point2::new(x as f32, y as f32));
            let v = sample_bilinear(&view, s.x, s.y);
            Luma([v.round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// Render the OCR input for one region of `gray`.
///
/// Returns `None` when the deskewed region falls outside the image.
pub fn render_ocr_input(
    gray: &GrayImage,
    region: &OcrRegion,
    dark_on_light: bool,
) -> Option<GrayImage> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let mut canvas = GrayImage::new(gray.width(), gray.height());
    let mut corners = Vec::with_capacity(region.component_boxes.len() * 4);

    for bbox in &region.component_boxes {
        corners.extend([
            (bbox.min_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
            (bbox.min_x, bbox.max_y),
            (bbox.max_x, bbox.min_y),
        ]);
        let Some(clipped) = bbox.clip(w, h) else {
            continue;
        };
        let mask = component_mask(gray, &clipped, dark_on_light);
        for (x, y, v) in mask.enumerate_pixels() {
            if v[0] > 0 {
                canvas.put_pixel(clipped.min_x as u32 + x, clipped.min_y as u32 + y, *v);
            }
        }
    }

    let deskew = Deskew::new(region.center, region.angle_deg);
    let rotated = deskew.warp(&canvas);
    let roi = BoundingBox::from_points(corners.into_iter().map(|(x, y)| {
        let p = deskew.forward(Point2::new(x as f32, y as f32));
        (p.x.round() as i32, p.y.round() as i32)
    }))?
    .clip(w, h)?;
    trace!("chain #{} ocr roi {:?}", region.chain_index, roi);

    let crop = imageops::crop_imm(
        &rotated,
        roi.min_x as u32,
        roi.min_y as u32,
        roi.width() as u32,
        roi.height() as u32,
    )
    .to_image();
    let mut padded = GrayImage::new(
        crop.width() + 2 * OCR_BORDER,
        crop.height() + 2 * OCR_BORDER,
    );
    imageops::replace(&mut padded, &crop, OCR_BORDER as i64, OCR_BORDER as i64);

    Some(imageops::resize(
        &padded,
        padded.width() * OCR_UPSCALE,
        padded.height() * OCR_UPSCALE,
        FilterType::Triangle,
    ))
}

/// One OCR call and its outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    pub chain_index: usize,
    pub raw: String,
    /// Cleaned number, `None` when the text was rejected.
    pub number: Option<String>,
}

/// Result of [`recognize_bib_numbers`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BibRecognition {
    pub plan: OcrPlan,
    pub texts: Vec<RecognizedText>,
    /// Distinct numbers, ascending.
    pub numbers: Vec<u32>,
}

/// Gate, render and read every chain of `detection`.
///
/// `gray` must be the image the detection ran on.
pub fn recognize_bib_numbers<R>(
    gray: &GrayImage,
    detection: &TextDetection,
    params: &TextDetectionParams,
    recognizer: &mut R,
) -> BibRecognition
where
    R: TextRecognizer + ?Sized,
{
    let plan = prepare_ocr_regions(detection, gray.width() as usize, params);
    read_plan(gray, plan, params, recognizer)
}

/// [`recognize_bib_numbers`] with a verification model for short chains.
pub fn recognize_bib_numbers_verified<R, V>(
    gray: &GrayImage,
    detection: &TextDetection,
    params: &TextDetectionParams,
    recognizer: &mut R,
    verifier: &mut V,
) -> BibRecognition
where
    R: TextRecognizer + ?Sized,
    V: ChainVerifier + ?Sized,
{
    let mut plan = prepare_ocr_regions(detection, gray.width() as usize, params);
    verify_regions(&mut plan, params, verifier);
    read_plan(gray, plan, params, recognizer)
}

fn read_plan<R>(
    gray: &GrayImage,
    plan: OcrPlan,
    params: &TextDetectionParams,
    recognizer: &mut R,
) -> BibRecognition
where
    R: TextRecognizer + ?Sized,
{
    let mut texts = Vec::new();
    for region in &plan.accepted {
        let Some(input) = render_ocr_input(gray, region, params.dark_on_light) else {
            debug!("chain #{}: empty ocr roi", region.chain_index);
            continue;
        };
        let Some(raw) = recognizer.recognize(&input, region) else {
            continue;
        };
        let number = validate_bib_text(&raw);
        debug!("chain #{}: read {raw:?} -> {number:?}", region.chain_index);
        texts.push(RecognizedText {
            chain_index: region.chain_index,
            raw,
            number,
        });
    }

    let mut numbers: Vec<u32> = texts
        .iter()
        .filter_map(|t| t.number.as_deref()?.parse().ok())
        .collect();
    numbers.sort_unstable();
    numbers.dedup();

    BibRecognition {
        plan,
        texts,
        numbers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textdetect::TextChain;

    const BOX_A: BoundingBox = BoundingBox {
        min_x: 8,
        min_y: 8,
        max_x: 21,
        max_y: 31,
    };
    const BOX_B: BoundingBox = BoundingBox {
        min_x: 23,
        min_y: 8,
        max_x: 36,
        max_y: 32,
    };

    /// Two dark 10x20 glyphs on white, each inside a slightly larger box.
    fn scene() -> GrayImage {
        let mut img = GrayImage::from_pixel(80, 60, Luma([255]));
        for (x0, y0) in [(10, 10), (25, 10)] {
            for y in y0..y0 + 20 {
                for x in x0..x0 + 10 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        img
    }

    fn region(angle_deg: f32) -> OcrRegion {
        let bbox = BOX_A.union(&BOX_B);
        OcrRegion {
            chain_index: 0,
            bbox,
            component_boxes: vec![BOX_A, BOX_B],
            direction: Vector2::new(1.0, 0.0),
            angle_deg,
            center: bbox.center(),
        }
    }

    #[test]
    fn mask_keeps_the_dark_glyph() {
        let mask = component_mask(&scene(), &BOX_A, true);
        assert_eq!(mask.dimensions(), (14, 24));
        assert_eq!(mask.get_pixel(6, 11)[0], 255);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        let lit = mask.pixels().filter(|p| p[0] == 255).count();
        assert_eq!(lit, 200);
    }

    #[test]
    fn mask_drops_smaller_blobs() {
        let mut img = scene();
        img.put_pixel(21, 31, Luma([0]));
        let mask = component_mask(&img, &BOX_A, true);
        assert_eq!(mask.get_pixel(13, 23)[0], 0);
        assert_eq!(mask.pixels().filter(|p| p[0] == 255).count(), 200);
    }

    #[test]
    fn horizontal_region_is_padded_and_upscaled() {
        let out = render_ocr_input(&scene(), &region(0.0), true).unwrap();
        // Union box is 29x25, plus a 3 px border on each side, times 3.
        assert_eq!(out.dimensions(), (105, 93));
        assert_eq!(out.get_pixel(28, 43)[0], 255);
        assert_eq!(out.get_pixel(52, 43)[0], 0);
        assert_eq!(out.get_pixel(1, 1)[0], 0);
    }

    #[test]
    fn rotated_region_swaps_extent() {
        let out = render_ocr_input(&scene(), &region(90.0), true).unwrap();
        assert_eq!(out.dimensions(), (93, 105));
        assert!(out.get_pixel(43, 73)[0] > 200);
    }

    #[test]
    fn region_outside_the_image_is_skipped() {
        let mut r = region(0.0);
        r.component_boxes = vec![BoundingBox::new(200, 200, 220, 230)];
        assert!(render_ocr_input(&scene(), &r, true).is_none());
    }

    struct Scripted(Vec<&'static str>);

    impl TextRecognizer for Scripted {
        fn recognize(&mut self, image: &GrayImage, _region: &OcrRegion) -> Option<String> {
            assert!(image.width() > 0 && image.height() > 0);
            self.0.pop().map(str::to_string)
        }
    }

    fn detection() -> TextDetection {
        let bbox = BOX_A.union(&BOX_B);
        TextDetection {
            chains: vec![
                TextChain {
                    components: vec![0, 1],
                    p: 0,
                    q: 1,
                    direction: Vector2::new(-1.0, 0.0),
                    bbox,
                },
                TextChain {
                    components: vec![0, 1],
                    p: 0,
                    q: 1,
                    direction: Vector2::new(1.0, 0.0),
                    bbox,
                },
            ],
            component_boxes: vec![BOX_A, BOX_B],
            ..TextDetection::default()
        }
    }

    #[test]
    fn recognized_text_is_cleaned_and_deduplicated() {
        let mut ocr = Scripted(vec!["A1", " 41\n"]);
        let result = recognize_bib_numbers(
            &scene(),
            &detection(),
            &TextDetectionParams::default(),
            &mut ocr,
        );
        assert_eq!(result.plan.accepted.len(), 2);
        assert_eq!(result.texts.len(), 2);
        assert_eq!(result.texts[0].raw, " 41\n");
        assert_eq!(result.texts[1].number.as_deref(), Some("41"));
        assert_eq!(result.numbers, vec![41]);
    }

    #[test]
    fn verifier_filters_short_chains() {
        let params = TextDetectionParams::default().with_verification_model();
        let mut ocr = Scripted(vec!["7", "7"]);
        let mut reject_all = |_: &OcrRegion| false;
        let result = recognize_bib_numbers_verified(
            &scene(),
            &detection(),
            &params,
            &mut ocr,
            &mut reject_all,
        );
        assert!(result.plan.accepted.is_empty());
        assert_eq!(result.plan.rejected.len(), 2);
        assert!(result.numbers.is_empty());
    }
}
