//! Shared building blocks for bib-number text detection.
//!
//! The crate is deliberately dependency-light: borrowed color/gray views,
//! owned `f32` planes, inclusive pixel boxes and a small stderr logger. It
//! knows nothing about strokes or chains.

mod bbox;
mod image;
mod logger;

pub use bbox::{ratio_within, BoundingBox};
pub use image::{sample_bilinear, GrayImage, GrayImageView, ImageError, PlaneF32, RgbImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, LOG_ENV_VAR};
