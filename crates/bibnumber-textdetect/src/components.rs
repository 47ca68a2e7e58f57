//! Connected components of the stroke width map.

use log::debug;

use crate::swt::{PixelSample, StrokeWidthMap};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Largest width ratio between connected neighbors.
pub const MAX_NEIGHBOR_WIDTH_RATIO: f32 = 3.0;

/// One connected region; `value` of each pixel is its stroke width.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    /// Member pixels in raster order.
    pub pixels: Vec<PixelSample>,
}

impl Component {
    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// Right and down neighbors: the larger width is at most three times the smaller.
#[inline]
pub fn connects_orthogonal(a: f32, b: f32) -> bool {
    a.max(b) / a.min(b) <= MAX_NEIGHBOR_WIDTH_RATIO
}

/// Diagonal neighbors. Either ratio may satisfy the bound, which admits every
/// pair of positive widths.
#[inline]
pub fn connects_diagonal(a: f32, b: f32) -> bool {
    a / b <= MAX_NEIGHBOR_WIDTH_RATIO || b / a <= MAX_NEIGHBOR_WIDTH_RATIO
}

struct DisjointSet {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut i: u32) -> u32 {
        while self.parent[i as usize] != i {
            let grand = self.parent[self.parent[i as usize] as usize];
            self.parent[i as usize] = grand;
            i = grand;
        }
        i
    }

    fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra as usize].cmp(&self.rank[rb as usize]) {
            std::cmp::Ordering::Less => self.parent[ra as usize] = rb,
            std::cmp::Ordering::Greater => self.parent[rb as usize] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb as usize] = ra;
                self.rank[ra as usize] += 1;
            }
        }
    }
}

/// Label connected stroke pixels.
///
/// Components are numbered by the raster position of their first pixel.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(map), fields(width = map.width(), height = map.height()))
)]
pub fn extract_components(map: &StrokeWidthMap) -> Vec<Component> {
    let (w, h) = (map.width(), map.height());
    let mut sets = DisjointSet::new(w * h);
    let id = |x: usize, y: usize| (y * w + x) as u32;

    for (x, y, a) in map.strokes() {
        if x + 1 < w {
            if let Some(b) = map.get(x + 1, y) {
                if connects_orthogonal(a, b) {
                    sets.union(id(x, y), id(x + 1, y));
                }
            }
        }
        if y + 1 >= h {
            continue;
        }
        if let Some(b) = map.get(x, y + 1) {
            if connects_orthogonal(a, b) {
                sets.union(id(x, y), id(x, y + 1));
            }
        }
        if x + 1 < w {
            if let Some(b) = map.get(x + 1, y + 1) {
                if connects_diagonal(a, b) {
                    sets.union(id(x, y), id(x + 1, y + 1));
                }
            }
        }
        if x > 0 {
            if let Some(b) = map.get(x - 1, y + 1) {
                if connects_diagonal(a, b) {
                    sets.union(id(x, y), id(x - 1, y + 1));
                }
            }
        }
    }

    let mut label_of_root = vec![u32::MAX; w * h];
    let mut components: Vec<Component> = Vec::new();
    for (x, y, width) in map.strokes() {
        let root = sets.find(id(x, y)) as usize;
        if label_of_root[root] == u32::MAX {
            label_of_root[root] = components.len() as u32;
            components.push(Component { pixels: Vec::new() });
        }
        components[label_of_root[root] as usize].pixels.push(PixelSample {
            x: x as i32,
            y: y as i32,
            value: width,
        });
    }

    debug!(
        "components: {} from {} stroke pixels",
        components.len(),
        map.stroke_pixel_count()
    );
    components
}
