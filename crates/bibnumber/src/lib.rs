//! Read race bib numbers from photographs.
//!
//! This crate ties the workspace together:
//! - re-exports of the image primitives ([`core`]) and the stroke width
//!   transform detector ([`textdetect`]);
//! - the OCR hand-off gate and string clean-up, usable with any OCR engine;
//! - (feature `image`) adapters from `image::RgbImage`, input downscaling and
//!   rendering of deskewed OCR crops;
//! - (feature `cli`) the `bibnumber` command line tool.
//!
//! ## Quickstart
//!
//! ```no_run
//! use bibnumber::detect::{detect_text, gray_image, load_rgb, resize_for_detection};
//! use bibnumber::ocr::{recognize_bib_numbers, TextRecognizer};
//! use bibnumber::{OcrRegion, TextDetectionParams};
//!
//! struct MyOcr;
//!
//! impl TextRecognizer for MyOcr {
//!     fn recognize(&mut self, _image: &image::GrayImage, _region: &OcrRegion) -> Option<String> {
//!         None
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut img = load_rgb("finish.jpg")?;
//! if let Some(smaller) = resize_for_detection(&img, 1200) {
//!     img = smaller;
//! }
//! let params = TextDetectionParams::for_image_height(img.height() as usize);
//! let detection = detect_text(&img, &params);
//! let result = recognize_bib_numbers(&gray_image(&img), &detection, &params, &mut MyOcr);
//! println!("bib numbers: {:?}", result.numbers);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `bibnumber::core`: image views, planes, boxes, logger.
//! - `bibnumber::textdetect`: the five detector stages and `TextDetector`.
//! - `bibnumber::recognition`: OCR gate and verification hook.
//! - `bibnumber::correction`: OCR string clean-up.
//! - `bibnumber::detect` / `bibnumber::ocr` (feature `image`): `image` crate glue.

pub use bibnumber_core as core;
pub use bibnumber_textdetect as textdetect;

pub use bibnumber_core::BoundingBox;
pub use bibnumber_textdetect::{
    ContainmentPolicy, TextChain, TextDetection, TextDetectionParams, TextDetector,
};

pub mod correction;
pub mod recognition;

pub use correction::{parse_bib_number, validate_bib_text};
pub use recognition::{
    collect_bib_numbers, prepare_ocr_regions, ChainRejection, ChainVerifier, OcrPlan, OcrRegion,
};

#[cfg(feature = "image")]
pub mod detect;
#[cfg(feature = "image")]
pub mod ocr;
