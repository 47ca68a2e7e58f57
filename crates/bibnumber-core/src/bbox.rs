use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Inclusive axis-aligned pixel box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl BoundingBox {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        debug_assert!(min_x <= max_x && min_y <= max_y);
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Exact extent of a set of pixel coordinates, `None` when empty.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        let mut it = points.into_iter();
        let (x0, y0) = it.next()?;
        let mut bb = Self::new(x0, y0, x0, y0);
        for (x, y) in it {
            bb.min_x = bb.min_x.min(x);
            bb.min_y = bb.min_y.min(y);
            bb.max_x = bb.max_x.max(x);
            bb.max_y = bb.max_y.max(y);
        }
        Some(bb)
    }

    /// Pixel count along x (`max_x - min_x + 1`).
    #[inline]
    pub fn width(&self) -> i32 {
        self.max_x - self.min_x + 1
    }

    /// Pixel count along y (`max_y - min_y + 1`).
    #[inline]
    pub fn height(&self) -> i32 {
        self.max_y - self.min_y + 1
    }

    #[inline]
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Midpoint of the box corners.
    #[inline]
    pub fn center(&self) -> Point2<f32> {
        Point2::new(
            (self.max_x + self.min_x) as f32 / 2.0,
            (self.max_y + self.min_y) as f32 / 2.0,
        )
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Strict interior test; points on the boundary are outside.
    #[inline]
    pub fn strictly_contains_point(&self, p: &Point2<f32>) -> bool {
        p.x > self.min_x as f32
            && p.x < self.max_x as f32
            && p.y > self.min_y as f32
            && p.y < self.max_y as f32
    }

    /// `other` lies inside `self`, shared edges allowed.
    #[inline]
    pub fn contains_box(&self, other: &Self) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Intersection with `[0, width) x [0, height)`, `None` when disjoint.
    pub fn clip(&self, width: usize, height: usize) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let min_x = self.min_x.max(0);
        let min_y = self.min_y.max(0);
        let max_x = self.max_x.min(width as i32 - 1);
        let max_y = self.max_y.min(height as i32 - 1);
        (min_x <= max_x && min_y <= max_y).then_some(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }
}

/// Symmetric ratio check: `1/limit <= a/b <= limit`.
#[inline]
pub fn ratio_within(a: f32, b: f32, limit: f32) -> bool {
    let r = a / b;
    r <= limit && r >= 1.0 / limit
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn extent_matches_points() {
        let bb = BoundingBox::from_points([(4, 9), (2, 3), (7, 5)]).unwrap();
        assert_eq!(bb, BoundingBox::new(2, 3, 7, 9));
        assert_eq!(bb.width(), 6);
        assert_eq!(bb.height(), 7);
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn center_and_containment() {
        let outer = BoundingBox::new(0, 0, 10, 20);
        let c = outer.center();
        assert_relative_eq!(c.x, 5.0);
        assert_relative_eq!(c.y, 10.0);
        assert!(outer.strictly_contains_point(&Point2::new(1.0, 1.0)));
        assert!(!outer.strictly_contains_point(&Point2::new(0.0, 5.0)));
        assert!(outer.contains_box(&BoundingBox::new(0, 3, 4, 20)));
        assert!(!outer.contains_box(&BoundingBox::new(-1, 3, 4, 20)));
    }

    #[test]
    fn serializes_as_flat_record() {
        let json = serde_json::to_string(&BoundingBox::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, r#"{"min_x":1,"min_y":2,"max_x":3,"max_y":4}"#);
    }

    #[test]
    fn ratio_bounds_are_inclusive() {
        assert!(ratio_within(3.0, 1.0, 3.0));
        assert!(ratio_within(1.0, 3.0, 3.0));
        assert!(!ratio_within(3.1, 1.0, 3.0));
    }

    #[test]
    fn clipping_to_the_image() {
        let bb = BoundingBox::new(-5, 2, 12, 30);
        assert_eq!(bb.clip(10, 20), Some(BoundingBox::new(0, 2, 9, 19)));
        assert_eq!(BoundingBox::new(11, 0, 15, 3).clip(10, 20), None);
        assert_eq!(bb.clip(0, 20), None);
    }
}
