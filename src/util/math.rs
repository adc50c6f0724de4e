//! Math type re-exports and scan-space helpers.
//!
//! Geometry is stored in single precision, matching the capture pipeline.

pub use glam::{Mat4, Quat, Vec3, Vec4};

use std::fmt;

/// Axis-aligned bounds accumulated from scan vertices.
#[derive(Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Empty bounds (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Check if nothing has been accumulated yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Midpoint, or the origin when empty.
    #[inline]
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        (self.min + self.max) * 0.5
    }

    /// Full size along each axis, or zero when empty.
    #[inline]
    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        self.max - self.min
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bounds({:?} - {:?})", self.min, self.max)
    }
}

/// Flatten a matrix into the column-major layout used on disk.
#[inline]
pub fn mat4_to_floats(m: &Mat4) -> Vec<f32> {
    m.to_cols_array().to_vec()
}

/// Rebuild a matrix from 16 column-major floats.
pub fn mat4_from_floats(values: &[f32]) -> Option<Mat4> {
    let cols: &[f32; 16] = values.try_into().ok()?;
    Some(Mat4::from_cols_array(cols))
}

/// Rebuild a vector from exactly three floats.
pub fn vec3_from_floats(values: &[f32]) -> Option<Vec3> {
    match values {
        [x, y, z] => Some(Vec3::new(*x, *y, *z)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let mut b = Bounds::EMPTY;
        assert!(b.is_empty());
        assert_eq!(b.center(), Vec3::ZERO);

        b.expand_by_point(Vec3::new(-1.0, 0.0, 2.0));
        b.expand_by_point(Vec3::new(1.0, 4.0, 2.0));
        assert_eq!(b.center(), Vec3::new(0.0, 2.0, 2.0));
        assert_eq!(b.extent(), Vec3::new(2.0, 4.0, 0.0));
    }

    #[test]
    fn test_mat4_floats() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let flat = mat4_to_floats(&m);
        assert_eq!(flat.len(), 16);
        assert_eq!(mat4_from_floats(&flat), Some(m));
        assert_eq!(mat4_from_floats(&flat[..15]), None);
    }

    #[test]
    fn test_vec3_floats() {
        assert_eq!(vec3_from_floats(&[1.0, 2.0, 3.0]), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(vec3_from_floats(&[1.0, 2.0]), None);
    }
}
