//! Grayscale, edge-preserving smoothing, Canny edges and the gradient field.

use bibnumber_core::{GrayImage, PlaneF32, RgbImageView};
use log::debug;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Width of the frame along the image border where edges are cleared.
///
/// The smoothing pass zeroes the outermost pixel ring, which Canny would
/// otherwise report as an edge loop around every image.
pub const EDGE_BORDER_BAND: usize = 3;

/// Lower/upper Canny threshold factors around the intensity median.
const CANNY_LOW_FACTOR: f32 = 0.73;
const CANNY_HIGH_FACTOR: f32 = 1.27;

/// `sigma` OpenCV derives for a 5-tap Gaussian: `0.3 * ((5 - 1) / 2 - 1) + 0.8`.
const GRADIENT_BLUR_SIGMA: f32 = 1.1;

/// Output of the preprocessing stage.
#[derive(Clone, Debug)]
pub struct Preprocessed {
    pub gray: GrayImage,
    /// Edge-preserving smoothed intensities; read by the component filter.
    pub smoothed: GrayImage,
    /// Binary mask, `255` on edge pixels.
    pub edges: GrayImage,
    pub grad_x: PlaneF32,
    pub grad_y: PlaneF32,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Preprocessed {
    #[inline]
    pub fn width(&self) -> usize {
        self.gray.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.gray.height
    }

    #[inline]
    pub fn is_edge(&self, x: usize, y: usize) -> bool {
        self.edges.get(x, y) != 0
    }

    pub fn edge_count(&self) -> usize {
        self.edges.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Run every preprocessing step on a color image.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(image), fields(width = image.width, height = image.height))
)]
pub fn preprocess(image: &RgbImageView<'_>) -> Preprocessed {
    let gray = image.to_gray();
    let smoothed = edge_preserving_smoothing(&gray);

    let median = histogram_median(&smoothed);
    let (canny_low, canny_high) = auto_canny_thresholds(median);
    let edges = detect_edges(&smoothed, canny_low, canny_high);

    let normalized = PlaneF32::from_gray_normalized(&smoothed);
    let blurred = gaussian_blur_5x5(&normalized, GRADIENT_BLUR_SIGMA);
    let (gx, gy) = scharr_gradients(&blurred);
    let grad_x = median_3x3(&gx);
    let grad_y = median_3x3(&gy);

    let out = Preprocessed {
        gray,
        smoothed,
        edges,
        grad_x,
        grad_y,
        canny_low,
        canny_high,
    };
    debug!(
        "preprocess: median={} canny=({:.1}, {:.1}) edge_pixels={}",
        median,
        canny_low,
        canny_high,
        out.edge_count()
    );
    out
}

/// Single-pass edge-preserving smoothing.
///
/// Each non-zero interior pixel becomes a weighted sum over the first eight
/// entries of its raster-ordered 3x3 window (the center is included, the
/// bottom-right neighbor is not). Weights are `(1 - |center - v| / 255)^10`,
/// normalised to one; every term is rounded before summation. Zero pixels and
/// the outermost ring come out as zero.
pub fn edge_preserving_smoothing(gray: &GrayImage) -> GrayImage {
    let (w, h) = (gray.width, gray.height);
    let mut out = GrayImage::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }

    let src = |x: usize, y: usize| -> u8 {
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            0
        } else {
            gray.get(x, y)
        }
    };

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = src(x, y);
            if center == 0 {
                continue;
            }

            let mut samples = [0u8; 8];
            let mut coefs = [0f32; 8];
            let mut sum = 0f32;
            for k in 0..8 {
                let v = src(x + k % 3 - 1, y + k / 3 - 1);
                let d = (center as f32 - v as f32).abs() / 255.0;
                let c = (1.0 - d).powi(10);
                samples[k] = v;
                coefs[k] = c;
                sum += c;
            }

            let mut acc = 0u32;
            for (&v, &c) in samples.iter().zip(coefs.iter()) {
                acc += (c / sum * v as f32).round() as u32;
            }
            out.set(x, y, acc.min(255) as u8);
        }
    }
    out
}

/// First intensity whose cumulative histogram count exceeds half the pixels.
pub fn histogram_median(img: &GrayImage) -> u8 {
    let mut hist = [0usize; 256];
    for &v in &img.data {
        hist[v as usize] += 1;
    }
    let half = img.data.len() / 2;
    let mut cum = 0usize;
    for (value, &count) in hist.iter().enumerate() {
        cum += count;
        if cum > half {
            return value as u8;
        }
    }
    0
}

/// Canny thresholds `(0.73 m, 1.27 m)` clamped to `[0, 255]`.
pub fn auto_canny_thresholds(median: u8) -> (f32, f32) {
    let m = median as f32;
    let low = (CANNY_LOW_FACTOR * m).max(0.0);
    let high = (CANNY_HIGH_FACTOR * m).min(255.0);
    (low, high)
}

/// Canny edge mask with the border band cleared.
pub fn detect_edges(smoothed: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = (smoothed.width, smoothed.height);
    if w <= 2 * EDGE_BORDER_BAND || h <= 2 * EDGE_BORDER_BAND {
        return GrayImage::new(w, h);
    }
    let Some(buf) = image::GrayImage::from_raw(w as u32, h as u32, smoothed.data.clone()) else {
        return GrayImage::new(w, h);
    };

    // Hysteresis keeps magnitudes >= threshold; a zero threshold would mark
    // every suppressed pixel as well.
    let low = low.max(1.0);
    let canny = imageproc::edges::canny(&buf, low, high.max(low));
    let mut edges = GrayImage {
        width: w,
        height: h,
        data: canny.into_raw(),
    };
    for y in 0..h {
        for x in 0..w {
            let in_band = x < EDGE_BORDER_BAND
                || y < EDGE_BORDER_BAND
                || x >= w - EDGE_BORDER_BAND
                || y >= h - EDGE_BORDER_BAND;
            if in_band {
                edges.set(x, y, 0);
            }
        }
    }
    edges
}

fn gaussian_kernel_5(sigma: f32) -> [f32; 5] {
    let mut k = [0f32; 5];
    let denom = 2.0 * sigma * sigma;
    for (i, v) in k.iter_mut().enumerate() {
        let d = i as f32 - 2.0;
        *v = (-(d * d) / denom).exp();
    }
    let sum: f32 = k.iter().sum();
    k.iter_mut().for_each(|v| *v /= sum);
    k
}

/// Separable 5x5 Gaussian with replicated borders.
pub fn gaussian_blur_5x5(src: &PlaneF32, sigma: f32) -> PlaneF32 {
    let k = gaussian_kernel_5(sigma);
    let (w, h) = (src.width, src.height);
    let mut tmp = PlaneF32::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (i, kv) in k.iter().enumerate() {
                acc += kv * src.get_clamped(x as isize + i as isize - 2, y as isize);
            }
            tmp.set(x, y, acc);
        }
    }
    let mut out = PlaneF32::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (i, kv) in k.iter().enumerate() {
                acc += kv * tmp.get_clamped(x as isize, y as isize + i as isize - 2);
            }
            out.set(x, y, acc);
        }
    }
    out
}

/// Unscaled Scharr derivatives `(d/dx, d/dy)` with replicated borders.
pub fn scharr_gradients(src: &PlaneF32) -> (PlaneF32, PlaneF32) {
    let (w, h) = (src.width, src.height);
    let mut gx = PlaneF32::new(w, h);
    let mut gy = PlaneF32::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let (xi, yi) = (x as isize, y as isize);
            let p = |dx: isize, dy: isize| src.get_clamped(xi + dx, yi + dy);

            let dx = 3.0 * (p(1, -1) - p(-1, -1))
                + 10.0 * (p(1, 0) - p(-1, 0))
                + 3.0 * (p(1, 1) - p(-1, 1));
            let dy = 3.0 * (p(-1, 1) - p(-1, -1))
                + 10.0 * (p(0, 1) - p(0, -1))
                + 3.0 * (p(1, 1) - p(1, -1));
            gx.set(x, y, dx);
            gy.set(x, y, dy);
        }
    }
    (gx, gy)
}

/// 3x3 median filter with replicated borders.
pub fn median_3x3(src: &PlaneF32) -> PlaneF32 {
    let (w, h) = (src.width, src.height);
    let mut out = PlaneF32::new(w, h);
    let mut window = [0f32; 9];
    for y in 0..h {
        for x in 0..w {
            for (k, slot) in window.iter_mut().enumerate() {
                let dx = (k % 3) as isize - 1;
                let dy = (k / 3) as isize - 1;
                *slot = src.get_clamped(x as isize + dx, y as isize + dy);
            }
            let (_, median, _) = window.select_nth_unstable_by(4, f32::total_cmp);
            out.set(x, y, *median);
        }
    }
    out
}
