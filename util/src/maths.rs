//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of degrees in one revolution.
pub const DEG_PER_REV: f64 = 360.0;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the sign of a value as `-1`, `0` or `+1`.
///
/// Unlike `f64::signum` zero maps to zero, and so does `NaN`. This is used in
/// place of `x.abs() / x`, which is undefined at zero.
pub fn sign<T>(value: T) -> T
where
    T: Float
{
    if value > T::zero() {
        T::one()
    }
    else if value < T::zero() {
        -T::one()
    }
    else {
        T::zero()
    }
}

/// Clamp a value into the closed range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r >= T::zero() {
        return r;
    }

    // A tiny negative remainder rounds up to `rhs` when shifted
    let r = r + rhs.abs();
    if r == rhs.abs() { T::zero() } else { r }
}

/// Convert degrees to radians.
pub fn deg_to_rad(deg: f64) -> f64 {
    deg.to_radians()
}

/// Convert radians to degrees.
pub fn rad_to_deg(rad: f64) -> f64 {
    rad.to_degrees()
}

/// Convert an angle in degrees into a number of revolutions.
pub fn deg_to_rev(deg: f64) -> f64 {
    deg / DEG_PER_REV
}

/// Convert a number of revolutions into degrees.
pub fn rev_to_deg(rev: f64) -> f64 {
    rev * DEG_PER_REV
}

/// Wrap a heading in degrees into the range `[0, 360)`.
pub fn wrap_heading_deg(deg: f64) -> f64 {
    rem_euclid(deg, DEG_PER_REV)
}

/// Get the shortest signed turn, in degrees, equivalent to the given angle.
///
/// The result lies in `[-180, 180)`, so a turn of 190 degrees becomes -170
/// degrees and a turn of exactly 180 degrees becomes -180.
pub fn shortest_turn_path_deg(deg: f64) -> f64 {
    rem_euclid(deg + 180.0, DEG_PER_REV) - 180.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sign() {
        assert_eq!(sign(4.2f64), 1.0);
        assert_eq!(sign(-0.1f64), -1.0);
        assert_eq!(sign(0f64), 0.0);
        assert_eq!(sign(-0f64), 0.0);
        assert_eq!(sign(f64::NAN), 0.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(150.0, -100.0, 100.0), 100.0);
        assert_eq!(clamp(-150.0, -100.0, 100.0), -100.0);
        assert_eq!(clamp(12.5, -100.0, 100.0), 12.5);
    }

    #[test]
    fn test_shortest_turn_path() {
        assert!((shortest_turn_path_deg(190.0) - -170.0).abs() < 1e-9);
        assert!((shortest_turn_path_deg(-170.0) - -170.0).abs() < 1e-9);
        assert!((shortest_turn_path_deg(550.0) - -170.0).abs() < 1e-9);
        assert!((shortest_turn_path_deg(45.0) - 45.0).abs() < 1e-9);
        assert!((shortest_turn_path_deg(-350.0) - 10.0).abs() < 1e-9);
        assert!((shortest_turn_path_deg(180.0) - -180.0).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_heading() {
        assert!((wrap_heading_deg(370.0) - 10.0).abs() < 1e-9);
        assert!((wrap_heading_deg(-90.0) - 270.0).abs() < 1e-9);
        assert_eq!(wrap_heading_deg(0.0), 0.0);
        assert_eq!(wrap_heading_deg(-1e-15), 0.0);
        assert_eq!(rem_euclid(-1e-20_f64, 1.0), 0.0);
    }

    #[test]
    fn test_rev_conversions() {
        assert_eq!(deg_to_rev(720.0), 2.0);
        assert_eq!(rev_to_deg(0.25), 90.0);
    }
}
