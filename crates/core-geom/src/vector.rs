//! Immutable 2D vector value type.
//!
//! `normalize` on a zero-length vector returns `Vec2::ZERO` rather than NaN;
//! callers that need a direction must check `magnitude` first.

use std::ops::{Add, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector at `angle_rad` measured counter-clockwise from +x.
    pub fn from_angle(angle_rad: f64) -> Self {
        Self {
            x: angle_rad.cos(),
            y: angle_rad.sin(),
        }
    }

    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, k: f64) -> Vec2 {
        Vec2::new(self.x * k, self.y * k)
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Scalar (z-component of the 3D) cross product.
    pub fn cross(self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn magnitude(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn magnitude_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Unit vector in the same direction, or `Vec2::ZERO` when the magnitude
    /// is zero.
    pub fn normalize(self) -> Vec2 {
        let m = self.magnitude();
        if m == 0.0 {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / m, self.y / m)
        }
    }

    pub fn distance_to(self, other: Vec2) -> f64 {
        self.sub(other).magnitude()
    }

    pub fn distance_squared_to(self, other: Vec2) -> f64 {
        self.sub(other).magnitude_squared()
    }

    /// Rotate counter-clockwise by `angle_rad`.
    pub fn rotate(self, angle_rad: f64) -> Vec2 {
        let (sin, cos) = angle_rad.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Perpendicular vector (counter-clockwise quarter turn).
    pub fn perp(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    pub fn lerp(self, other: Vec2, t: f64) -> Vec2 {
        Vec2::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// Angle of this vector in radians, `(-π, π]`.
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn approx_eq(self, other: Vec2, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::add(self, rhs)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::sub(self, rhs)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        self.scale(rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn normalize_zero_returns_sentinel() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn normalize_produces_unit_length() {
        let v = Vec2::new(3.0, -4.0).normalize();
        assert_relative_eq!(v.magnitude(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rotate_quarter_turn() {
        let v = Vec2::new(1.0, 0.0).rotate(FRAC_PI_2);
        assert!(v.approx_eq(Vec2::new(0.0, 1.0), 1e-12));
    }

    #[test]
    fn rotate_half_turn_negates() {
        let v = Vec2::new(2.5, -1.5).rotate(PI);
        assert!(v.approx_eq(Vec2::new(-2.5, 1.5), 1e-12));
    }

    #[test]
    fn cross_sign_follows_orientation() {
        let x = Vec2::new(1.0, 0.0);
        let y = Vec2::new(0.0, 1.0);
        assert_relative_eq!(x.cross(y), 1.0);
        assert_relative_eq!(y.cross(x), -1.0);
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, -4.0);
        assert!(a.lerp(b, 0.0).approx_eq(a, 1e-12));
        assert!(a.lerp(b, 1.0).approx_eq(b, 1e-12));
        assert!(a.lerp(b, 0.5).approx_eq(Vec2::new(5.0, -2.0), 1e-12));
    }

    #[test]
    fn from_angle_round_trips_through_angle() {
        let v = Vec2::from_angle(0.7);
        assert_relative_eq!(v.angle(), 0.7, epsilon = 1e-12);
        assert_relative_eq!(v.magnitude(), 1.0, epsilon = 1e-12);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn rotation_preserves_magnitude(
                x in -1e6f64..1e6,
                y in -1e6f64..1e6,
                theta in -10.0f64..10.0,
            ) {
                let v = Vec2::new(x, y);
                let r = v.rotate(theta);
                prop_assert!((v.magnitude() - r.magnitude()).abs() < 1e-6);
            }

            #[test]
            fn dot_is_commutative(
                ax in -1e6f64..1e6, ay in -1e6f64..1e6,
                bx in -1e6f64..1e6, by in -1e6f64..1e6,
            ) {
                let a = Vec2::new(ax, ay);
                let b = Vec2::new(bx, by);
                prop_assert_eq!(a.dot(b), b.dot(a));
            }
        }
    }
}
