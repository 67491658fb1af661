use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

const NORMALIZE_EPSILON: f32 = 1e-8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const X: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    pub const Y: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    pub const Z: Vec3 = Vec3::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (self - other).length()
    }

    pub fn distance_squared(self, other: Vec3) -> f32 {
        (self - other).length_squared()
    }

    /// Returns the unit vector, or zero when the length is negligible.
    pub fn normalize_or_zero(self) -> Vec3 {
        let length_squared = self.length_squared();
        if length_squared <= NORMALIZE_EPSILON {
            return Vec3::ZERO;
        }
        self / length_squared.sqrt()
    }

    /// Caps the length at `max` while keeping the direction.
    pub fn truncate(self, max: f32) -> Vec3 {
        let length_squared = self.length_squared();
        if length_squared > max * max && length_squared > 0.0 {
            self * (max / length_squared.sqrt())
        } else {
            self
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Angle in radians between two non-zero vectors.
    pub fn angle_between(self, other: Vec3) -> f32 {
        let a = self.normalize_or_zero();
        let b = other.normalize_or_zero();
        a.dot(b).clamp(-1.0, 1.0).acos()
    }

    /// Rotates `self` around the unit `axis` by `angle` radians.
    pub fn rotate_around(self, axis: Vec3, angle: f32) -> Vec3 {
        let (sin, cos) = angle.sin_cos();
        self * cos + axis.cross(self) * sin + axis * (axis.dot(self) * (1.0 - cos))
    }

    /// Turns the unit vector `self` toward the unit vector `target` by at most
    /// `max_angle` radians.
    pub fn rotate_toward(self, target: Vec3, max_angle: f32) -> Vec3 {
        let angle = self.angle_between(target);
        if angle <= max_angle {
            return target;
        }

        let axis = self.cross(target).normalize_or_zero();
        let axis = if axis == Vec3::ZERO {
            // Opposite directions: turn around the perpendicular closest to Y.
            let side = Vec3::Y.cross(self).normalize_or_zero();
            if side == Vec3::ZERO {
                return self.rotate_around(Vec3::X, max_angle).normalize_or_zero();
            }
            self.cross(side).normalize_or_zero()
        } else {
            axis
        };
        self.rotate_around(axis, max_angle).normalize_or_zero()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Vec3) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;

    fn div(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use super::*;

    fn approx_eq(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn truncate_caps_length_and_keeps_direction() {
        let v = Vec3::new(3.0, 0.0, 4.0).truncate(2.5);
        assert!((v.length() - 2.5).abs() < 1e-5);
        assert!(approx_eq(v.normalize_or_zero(), Vec3::new(0.6, 0.0, 0.8)));
    }

    #[test]
    fn truncate_leaves_short_vectors_untouched() {
        let v = Vec3::new(1.0, 1.0, 0.0);
        assert_eq!(v.truncate(10.0), v);
    }

    #[test]
    fn normalize_of_zero_is_zero() {
        assert_eq!(Vec3::ZERO.normalize_or_zero(), Vec3::ZERO);
    }

    #[test]
    fn rotate_toward_snaps_when_within_limit() {
        let result = Vec3::Z.rotate_toward(Vec3::X, PI);
        assert!(approx_eq(result, Vec3::X));
    }

    #[test]
    fn rotate_toward_is_limited_by_max_angle() {
        let result = Vec3::Z.rotate_toward(Vec3::X, FRAC_PI_2 / 2.0);
        assert!((result.angle_between(Vec3::Z) - FRAC_PI_2 / 2.0).abs() < 1e-4);
        assert!((result.angle_between(Vec3::X) - FRAC_PI_2 / 2.0).abs() < 1e-4);
    }

    #[test]
    fn rotate_toward_handles_opposite_directions() {
        let result = Vec3::Z.rotate_toward(-Vec3::Z, FRAC_PI_2);
        assert!((result.angle_between(Vec3::Z) - FRAC_PI_2).abs() < 1e-4);
        assert!(result.y.abs() < 1e-4);
    }

    #[test]
    fn rotate_toward_opposite_of_a_tilted_heading_turns_by_max_angle() {
        let heading = Vec3::new(0.0, 0.6, 0.8);
        let quarter = FRAC_PI_2 / 2.0;

        let result = heading.rotate_toward(-heading, quarter);

        assert!((result.length() - 1.0).abs() < 1e-4);
        assert!((result.angle_between(heading) - quarter).abs() < 1e-4);
        assert!((result.angle_between(-heading) - (PI - quarter)).abs() < 1e-4);
    }

    #[test]
    fn rotate_toward_opposite_of_vertical_heading_turns_by_max_angle() {
        let result = Vec3::Y.rotate_toward(-Vec3::Y, FRAC_PI_2);
        assert!((result.angle_between(Vec3::Y) - FRAC_PI_2).abs() < 1e-4);
    }
}
