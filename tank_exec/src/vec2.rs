//! # Planar vector
//!
//! Positions, displacements and travel in the field plane. The direction
//! convention matches the heading sensor: a direction of 0 points along +Y
//! (forward), and positive directions rotate clockwise towards +X. All
//! directions are in radians.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A 2D vector.
///
/// Components are unitless, but mixing units between vectors makes the
/// magnitude and direction meaningless.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2(Vector2<f64>);

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Vec2 {

    /// Create a vector from its components.
    pub fn from_xy(x: f64, y: f64) -> Self {
        Self(Vector2::new(x, y))
    }

    /// Create a vector from a direction (radians) and magnitude.
    ///
    /// A positive magnitude with direction 0 is pure +Y, direction pi/2 is
    /// pure +X.
    pub fn from_dir_and_mag(direction_rad: f64, magnitude: f64) -> Self {
        Self::from_xy(
            magnitude * direction_rad.sin(),
            magnitude * direction_rad.cos()
        )
    }

    /// The X (lateral) component.
    pub fn x(&self) -> f64 {
        self.0[0]
    }

    /// The Y (forward) component.
    pub fn y(&self) -> f64 {
        self.0[1]
    }

    /// Length of the vector.
    pub fn magnitude(&self) -> f64 {
        self.0.norm()
    }

    /// Direction of the vector in radians, measured clockwise from +Y.
    ///
    /// This is `atan2(x, y)`, note the swapped arguments compared to the usual
    /// `atan2(y, x)`.
    pub fn direction(&self) -> f64 {
        self.x().atan2(self.y())
    }

    /// A unit vector with the same direction.
    ///
    /// The zero vector has no direction, normalising it yields `NaN`
    /// components rather than an error.
    pub fn normalize(&self) -> Self {
        *self * (1.0 / self.magnitude())
    }

    /// Distance from this point to `target`.
    pub fn distance_to(&self, target: Vec2) -> f64 {
        (target - *self).magnitude()
    }

    /// Direction from this point to `target`, in radians.
    pub fn angle_to(&self, target: Vec2) -> f64 {
        (target - *self).direction()
    }

    /// Dot product of the two vectors.
    pub fn dot(&self, other: Vec2) -> f64 {
        self.0.dot(&other.0)
    }
}

impl From<Vector2<f64>> for Vec2 {
    fn from(v: Vector2<f64>) -> Self {
        Self(v)
    }
}

impl From<Vec2> for Vector2<f64> {
    fn from(v: Vec2) -> Self {
        v.0
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2(self.0 + rhs.0)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2(self.0 - rhs.0)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2(-self.0)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, scale: f64) -> Vec2 {
        Vec2(self.0 * scale)
    }
}

/// Dot product
impl Mul<Vec2> for Vec2 {
    type Output = f64;

    fn mul(self, rhs: Vec2) -> f64 {
        self.dot(rhs)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.0 -= rhs.0;
    }
}

impl MulAssign<f64> for Vec2 {
    fn mul_assign(&mut self, scale: f64) {
        self.0 *= scale;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const EPS: f64 = 1e-9;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).magnitude() < EPS
    }

    #[test]
    fn test_magnitude_direction() {
        assert_eq!(Vec2::from_xy(3.0, 4.0).magnitude(), 5.0);

        assert!(Vec2::from_xy(0.0, 5.0).direction().abs() < EPS);
        assert!((Vec2::from_xy(2.0, 0.0).direction() - FRAC_PI_2).abs() < EPS);
        assert!((Vec2::from_xy(0.0, -1.0).direction().abs() - PI).abs() < EPS);
    }

    #[test]
    fn test_dir_and_mag() {
        assert!(approx(Vec2::from_dir_and_mag(0.0, 5.0), Vec2::from_xy(0.0, 5.0)));
        assert!(approx(Vec2::from_dir_and_mag(FRAC_PI_2, 2.0), Vec2::from_xy(2.0, 0.0)));
        assert!(approx(Vec2::from_dir_and_mag(-FRAC_PI_2, 2.0), Vec2::from_xy(-2.0, 0.0)));

        // Round trip through direction/magnitude
        let v = Vec2::from_xy(-1.5, 7.25);
        assert!(approx(Vec2::from_dir_and_mag(v.direction(), v.magnitude()), v));
    }

    #[test]
    fn test_operators() {
        let a = Vec2::from_xy(1.25, -3.0);
        let b = Vec2::from_xy(-7.5, 0.5);

        assert!(approx((a + b) - b, a));
        assert!(approx(a * 2.0, Vec2::from_xy(2.5, -6.0)));
        assert!(approx(-a, Vec2::from_xy(-1.25, 3.0)));
        assert_eq!(a * b, 1.25 * -7.5 + -3.0 * 0.5);

        let mut c = a;
        c += b;
        assert!(approx(c, a + b));
        c -= b;
        assert!(approx(c, a));
        c *= -1.0;
        assert!(approx(c, -a));
    }

    #[test]
    fn test_distance_and_angle() {
        let start = Vec2::from_xy(1.0, 1.0);
        let target = Vec2::from_xy(4.0, 5.0);

        assert!((start.distance_to(target) - 5.0).abs() < EPS);
        assert!((start.angle_to(Vec2::from_xy(1.0, 10.0))).abs() < EPS);
        assert!((start.angle_to(Vec2::from_xy(-3.0, 1.0)) + FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn test_normalize() {
        let n = Vec2::from_xy(3.0, 4.0).normalize();
        assert!((n.magnitude() - 1.0).abs() < EPS);
        assert!(approx(n, Vec2::from_xy(0.6, 0.8)));

        let z = Vec2::default().normalize();
        assert!(z.x().is_nan() && z.y().is_nan());
    }
}
