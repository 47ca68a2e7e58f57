#![allow(dead_code)]

use bibnumber_core::RgbImageView;

pub const WHITE: [u8; 3] = [255, 255, 255];
pub const BLACK: [u8; 3] = [0, 0, 0];

/// Route detector logs to the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Packed RGB canvas for synthetic scenes.
pub struct Canvas {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Canvas {
    pub fn new(width: usize, height: usize, color: [u8; 3]) -> Self {
        assert!(width > 0 && height > 0, "canvas dimensions must be positive");
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Fill `[x0, x0 + w) x [y0, y0 + h)`.
    pub fn fill_rect(&mut self, x0: usize, y0: usize, w: usize, h: usize, color: [u8; 3]) {
        for y in y0..(y0 + h).min(self.height) {
            for x in x0..(x0 + w).min(self.width) {
                let off = (y * self.width + x) * 3;
                self.data[off..off + 3].copy_from_slice(&color);
            }
        }
    }

    pub fn view(&self) -> RgbImageView<'_> {
        RgbImageView::packed_rgb(self.width, self.height, &self.data).expect("packed canvas")
    }
}

/// Dark vertical bars of equal size, left edges at `xs`.
pub fn bars(width: usize, height: usize, xs: &[usize], y0: usize, w: usize, h: usize) -> Canvas {
    let mut canvas = Canvas::new(width, height, WHITE);
    for &x in xs {
        canvas.fill_rect(x, y0, w, h, BLACK);
    }
    canvas
}
