use serde::{Deserialize, Serialize};

use crate::util::vec2::Vec2;

/// Axis-aligned bounding box in world coordinates
///
/// Invariant: `min` is component-wise `<=` `max` and both corners are finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    min: Vec2,
    max: Vec2,
}

impl Aabb {
    /// Build an AABB from its corners
    ///
    /// # Panics
    /// Panics if a corner is non-finite or `min` exceeds `max` on either axis.
    pub fn new(min: Vec2, max: Vec2) -> Self {
        assert!(
            min.is_finite() && max.is_finite(),
            "invalid AABB: non-finite corner (min={min:?}, max={max:?})"
        );
        assert!(
            min.x <= max.x && min.y <= max.y,
            "invalid AABB: min > max (min={min:?}, max={max:?})"
        );
        Self { min, max }
    }

    /// Build from a min corner and a (non-negative) size
    pub fn from_min_size(min: Vec2, size: Vec2) -> Self {
        Self::new(min, min + size)
    }

    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        let he = half_extents.abs();
        Self::new(center - he, center + he)
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        self.max
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Longest edge of the box; drives tier selection
    #[inline]
    pub fn longest_edge(&self) -> f32 {
        (self.max - self.min).max_element()
    }

    /// Inclusive overlap test: touching edges count as overlapping
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Same box moved by `offset`
    #[inline]
    pub fn translated(&self, offset: Vec2) -> Self {
        Self::new(self.min + offset, self.max + offset)
    }
}
