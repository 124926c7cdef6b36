//! # Horizontal tracker
//!
//! An unpowered wheel mounted perpendicular to the drive wheels, measuring
//! sideways travel that the drive encoders cannot see.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use util::maths::deg_to_rad;

use crate::devices::{lock, RotarySensor, Shared};
use crate::params::TrackerParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct HorizontalTracker {
    encoder: Shared<dyn RotarySensor>,
    params: TrackerParams,

    /// Encoder angle at the previous call to `travel`, degrees.
    last_angle: f64,

    /// Travel returned by the previous call to `travel`, inches.
    last_travel: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HorizontalTracker {
    pub fn new(encoder: Shared<dyn RotarySensor>, params: TrackerParams) -> Self {
        let last_angle = lock(&encoder).angle();

        Self {
            encoder,
            params,
            last_angle,
            last_travel: 0.0,
        }
    }

    /// Lateral travel since the last call, in inches. Positive to the right.
    ///
    /// Must be called exactly once per tracking cycle, every call moves the
    /// baseline.
    pub fn travel(&mut self) -> f64 {
        let current = lock(&self.encoder).angle();
        let delta_deg = current - self.last_angle;
        self.last_angle = current;

        self.last_travel = deg_to_rad(delta_deg)
            * (self.params.wheel_diameter_in / 2.0)
            * self.params.gear_ratio;

        self.last_travel
    }

    /// Travel returned by the most recent call to `travel`.
    pub fn last_travel(&self) -> f64 {
        self.last_travel
    }

    /// Zero the encoder and the baseline.
    pub fn reset(&mut self) {
        lock(&self.encoder).reset_angle();
        self.last_angle = 0.0;
        self.last_travel = 0.0;
    }

    /// Distance from the tracking point to the robot centre, inches.
    pub fn offset(&self) -> f64 {
        self.params.offset_in
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimParams, SimRobot};
    use std::f64::consts::PI;

    const EPS: f64 = 1e-9;

    fn params() -> TrackerParams {
        TrackerParams {
            wheel_diameter_in: 2.0,
            gear_ratio: 1.0,
            offset_in: -3.0,
        }
    }

    #[test]
    fn test_travel() {
        let robot = SimRobot::manual(SimParams::default());
        let enc = robot.tracker_encoder();
        let mut t = HorizontalTracker::new(enc.clone(), params());

        // Quarter of a revolution of a 2 inch wheel
        lock(&enc).set_angle(90.0);
        assert!((t.travel() - PI / 2.0).abs() < EPS);
        assert!((t.last_travel() - PI / 2.0).abs() < EPS);

        // No movement since last call
        assert_eq!(t.travel(), 0.0);

        lock(&enc).set_angle(0.0);
        assert!((t.travel() + PI / 2.0).abs() < EPS);
        assert_eq!(t.offset(), -3.0);
    }

    #[test]
    fn test_gear_ratio() {
        let robot = SimRobot::manual(SimParams::default());
        let enc = robot.tracker_encoder();
        let mut p = params();
        p.gear_ratio = 0.5;
        let mut t = HorizontalTracker::new(enc.clone(), p);

        lock(&enc).set_angle(360.0);
        assert!((t.travel() - PI).abs() < EPS);
    }

    #[test]
    fn test_reset() {
        let robot = SimRobot::manual(SimParams::default());
        let enc = robot.tracker_encoder();
        lock(&enc).set_angle(45.0);

        let mut t = HorizontalTracker::new(enc.clone(), params());
        t.reset();
        assert_eq!(lock(&enc).angle(), 0.0);
        assert_eq!(t.travel(), 0.0);
    }
}
