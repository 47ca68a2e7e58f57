//! `image` crate adapters: decoding, downscaling and one-call detection.

use std::path::Path;

use ::image::imageops::FilterType;
use ::image::{GrayImage, Luma, RgbImage};
use log::debug;

use crate::core::RgbImageView;
use crate::textdetect::{TextDetection, TextDetectionParams, TextDetector};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Photographs wider than this are downscaled before detection.
pub const DEFAULT_MAX_WIDTH: u32 = 1200;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid RGB image buffer length (expected {expected} bytes, got {got})")]
    InvalidRgbBuffer { expected: usize, got: usize },

    #[error("invalid RGB image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Image(#[from] ::image::ImageError),

    #[error(transparent)]
    View(#[from] crate::core::ImageError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid detector config {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Borrow an `image::RgbImage` as a core view.
pub fn rgb_view(img: &RgbImage) -> RgbImageView<'_> {
    RgbImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        stride: img.width() as usize * 3,
        channels: 3,
        data: img.as_raw(),
    }
}

/// Luma of `img` with the weights the detector uses internally.
pub fn gray_image(img: &RgbImage) -> GrayImage {
    let gray = rgb_view(img).to_gray();
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([gray.get(x as usize, y as usize)])
    })
}

/// Build an `image::RgbImage` from a packed RGB buffer.
pub fn rgb_image_from_slice(
    width: u32,
    height: u32,
    bytes: &[u8],
) -> Result<RgbImage, DetectError> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or(DetectError::InvalidDimensions { width, height })?;
    if bytes.len() != expected {
        return Err(DetectError::InvalidRgbBuffer {
            expected,
            got: bytes.len(),
        });
    }
    RgbImage::from_raw(width, height, bytes.to_vec())
        .ok_or(DetectError::InvalidDimensions { width, height })
}

/// Downscale `img` to `max_width` columns, keeping the aspect ratio.
///
/// Returns `None` when the image is already narrow enough.
pub fn resize_for_detection(img: &RgbImage, max_width: u32) -> Option<RgbImage> {
    let (w, h) = img.dimensions();
    if max_width == 0 || w <= max_width {
        return None;
    }
    let scale = max_width as f64 / w as f64;
    let new_h = ((h as f64 * scale).round() as u32).max(1);
    debug!("resize {w}x{h} -> {max_width}x{new_h}");
    Some(::image::imageops::resize(
        img,
        max_width,
        new_h,
        FilterType::Triangle,
    ))
}

/// Decode an image file into RGB; the format is sniffed from the content.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage, DetectError> {
    let path = path.as_ref();
    let io_err = |source| DetectError::Io {
        path: path.display().to_string(),
        source,
    };
    let reader = ::image::ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?;
    Ok(reader.decode()?.to_rgb8())
}

/// Read detector parameters from a JSON file; missing keys keep defaults.
pub fn load_params(path: impl AsRef<Path>) -> Result<TextDetectionParams, DetectError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| DetectError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| DetectError::Config {
        path: path.display().to_string(),
        source,
    })
}

/// Run the text detector on an `image::RgbImage`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(width = img.width(), height = img.height()))
)]
pub fn detect_text(img: &RgbImage, params: &TextDetectionParams) -> TextDetection {
    TextDetector::new(params.clone()).detect(&rgb_view(img))
}
