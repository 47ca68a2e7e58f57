//! Lightweight raster types.
//!
//! Views borrow caller memory; owned images and planes are flat, row-major
//! buffers. Accessors check bounds with `debug_assert!` only.

/// Errors raised when wrapping an external pixel buffer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("unsupported channel count {channels} (expected 3 or 4)")]
    UnsupportedChannels { channels: usize },

    #[error("row stride {stride} is smaller than width * channels = {min}")]
    StrideTooSmall { stride: usize, min: usize },

    #[error("pixel buffer too small (expected at least {expected} bytes, got {got})")]
    BufferTooSmall { expected: usize, got: usize },

    #[error("image dimensions overflow (width={width}, height={height})")]
    DimensionOverflow { width: usize, height: usize },
}

/// Borrowed interleaved color raster (RGB or RGBA, 8 bits per channel).
///
/// `stride` is the distance in bytes between two rows. Alpha, when present,
/// is ignored.
#[derive(Clone, Copy, Debug)]
pub struct RgbImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub channels: usize,
    pub data: &'a [u8],
}

impl<'a> RgbImageView<'a> {
    /// Wrap a buffer after validating stride, channel count and length.
    pub fn new(
        width: usize,
        height: usize,
        stride: usize,
        channels: usize,
        data: &'a [u8],
    ) -> Result<Self, ImageError> {
        if channels != 3 && channels != 4 {
            return Err(ImageError::UnsupportedChannels { channels });
        }
        let min_stride = width
            .checked_mul(channels)
            .ok_or(ImageError::DimensionOverflow { width, height })?;
        if stride < min_stride {
            return Err(ImageError::StrideTooSmall {
                stride,
                min: min_stride,
            });
        }
        // The last row only needs `width * channels` bytes.
        let expected = match height {
            0 => 0,
            h => (h - 1)
                .checked_mul(stride)
                .and_then(|v| v.checked_add(min_stride))
                .ok_or(ImageError::DimensionOverflow { width, height })?,
        };
        if data.len() < expected {
            return Err(ImageError::BufferTooSmall {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            channels,
            data,
        })
    }

    /// Tightly packed RGB buffer (`stride = 3 * width`).
    pub fn packed_rgb(width: usize, height: usize, data: &'a [u8]) -> Result<Self, ImageError> {
        let stride = width
            .checked_mul(3)
            .ok_or(ImageError::DimensionOverflow { width, height })?;
        Self::new(width, height, stride, 3, data)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        debug_assert!(x < self.width && y < self.height);
        let off = y * self.stride + x * self.channels;
        [self.data[off], self.data[off + 1], self.data[off + 2]]
    }

    /// Luma conversion with BT.601 weights, rounded to nearest.
    pub fn to_gray(&self) -> GrayImage {
        let mut out = GrayImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let [r, g, b] = self.pixel(x, y);
                let luma = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
                out.data[y * self.width + x] = ((luma + 500) / 1000) as u8;
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.width + x]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.width + x] = v;
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// Sample with coordinates clamped to the image (replicated border).
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> u8 {
        let xx = x.clamp(0, self.width as isize - 1) as usize;
        let yy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[yy * self.width + xx]
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample; pixels outside the image read as zero.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let top = p00 + fx * (p10 - p00);
    let bottom = p01 + fx * (p11 - p01);
    top + fy * (bottom - top)
}

/// Single-channel `f32` plane (gradients, blurred intensities, stroke widths).
#[derive(Clone, Debug, PartialEq)]
pub struct PlaneF32 {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl PlaneF32 {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Intensities of `img` scaled to `[0, 1]`.
    pub fn from_gray_normalized(img: &GrayImage) -> Self {
        Self {
            width: img.width,
            height: img.height,
            data: img.data.iter().map(|&v| v as f32 / 255.0).collect(),
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        let xx = x.clamp(0, self.width as isize - 1) as usize;
        let yy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[yy * self.width + xx]
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }
}
