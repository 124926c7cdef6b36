//! # Odometry
//!
//! Estimates the robot's position in the field plane by integrating the
//! drive encoders along the inertial heading, optionally corrected for
//! sideways slip by a horizontal tracking wheel.
//!
//! The estimator runs on its own thread, started with [`Odometry::start`].
//! It first waits for the heading sensor to finish calibrating, then runs one
//! [`Odometry::step`] every cycle period until stopped. The pose is published
//! through an [`OdomHandle`], which is the only way other threads read it or
//! request an override of the heading or position. The estimator is the sole
//! writer of the pose.
//!
//! Within a cycle both the forward and the lateral displacement are taken
//! along the heading read at the start of the cycle, which assumes the robot
//! turns only a little per cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::f64::consts::FRAC_PI_2;
use std::sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use log::{debug, info, trace};
use serde::Serialize;

// Internal
use util::maths::{deg_to_rad, deg_to_rev};
use crate::devices::{lock, HeadingSensor, MotorGroup, Shared};
use crate::params::{ConfigError, DriveParams};
use crate::tracker::HorizontalTracker;
use crate::vec2::Vec2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Estimated pose of the robot.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct Pose {
    /// Position of the tracking point, inches.
    pub position: Vec2,

    /// Position of the robot's geometric centre, inches. Equal to `position`
    /// when there is no tracking wheel.
    pub center_position: Vec2,

    /// Heading in degrees, `[0, 360)`.
    pub heading_deg: f64,
}

/// Position and heading estimator.
pub struct Odometry {
    left: Shared<dyn MotorGroup>,
    right: Shared<dyn MotorGroup>,
    imu: Shared<dyn HeadingSensor>,
    tracker: Option<HorizontalTracker>,

    wheel_travel_in: f64,
    cycle_period: Duration,

    /// Encoder readings at the previous step, private to the estimator so
    /// that motion primitives reading the encoders do not disturb it.
    last_left: f64,
    last_right: f64,

    state: Arc<Mutex<OdomState>>,
}

/// State shared between the estimator and its handles.
#[derive(Debug, Default)]
struct OdomState {
    pose: Pose,

    /// Heading to push to the sensor at the start of the next step.
    pending_heading: Option<f64>,

    /// Position to overwrite the estimate with at the next step.
    pending_position: Option<Vec2>,
}

/// Handle to a running estimator.
///
/// Dropping the handle stops the estimator.
pub struct OdomHandle {
    state: Arc<Mutex<OdomState>>,
    run: Arc<AtomicBool>,
    tracking: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<Odometry>>,
}

/// Read-only view of a running estimator's pose, for other threads.
#[derive(Clone)]
pub struct PoseReader {
    state: Arc<Mutex<OdomState>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OdomError {
    #[error("Could not spawn the odometry thread: {0}")]
    CannotSpawnThread(std::io::Error),

    #[error("The odometry thread panicked")]
    ThreadPanicked,

    #[error("The odometry thread has already been stopped")]
    AlreadyStopped,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Odometry {

    /// Create a new estimator at the origin with a heading of 0.
    pub fn new(
        left: Shared<dyn MotorGroup>,
        right: Shared<dyn MotorGroup>,
        imu: Shared<dyn HeadingSensor>,
        tracker: Option<HorizontalTracker>,
        params: &DriveParams
    ) -> Result<Self, ConfigError> {
        params.validate()?;

        let mut odom = Self {
            left,
            right,
            imu,
            tracker,
            wheel_travel_in: params.wheel_travel_in(),
            cycle_period: params.cycle_period(),
            last_left: 0.0,
            last_right: 0.0,
            state: Arc::new(Mutex::new(OdomState::default())),
        };

        odom.seed();

        Ok(odom)
    }

    /// Take the current sensor readings as the baseline for the next step.
    ///
    /// Called when tracking starts so that movement before then is ignored.
    pub fn seed(&mut self) {
        self.last_left = lock(&self.left).angle();
        self.last_right = lock(&self.right).angle();

        if let Some(ref mut t) = self.tracker {
            t.reset();
        }
    }

    /// Run one estimation cycle, returning the new pose.
    pub fn step(&mut self) -> Pose {
        // Take any pending overrides
        let (pending_heading, pending_position) = {
            let mut s = lock(&self.state);
            (s.pending_heading.take(), s.pending_position.take())
        };

        // Heading, pushing the override to the sensor first
        let heading_deg = {
            let mut imu = lock(&self.imu);
            if let Some(h) = pending_heading {
                debug!("Setting heading to {:.2} deg", h);
                imu.set_heading(h);
            }
            imu.heading()
        };
        let heading_rad = deg_to_rad(heading_deg);

        // Drive travel
        let left = lock(&self.left).angle();
        let right = lock(&self.right).angle();
        let wheel_delta = ((left - self.last_left) + (right - self.last_right)) / 2.0;
        self.last_left = left;
        self.last_right = right;

        let linear = deg_to_rev(wheel_delta) * self.wheel_travel_in;
        let mut displacement = Vec2::from_dir_and_mag(heading_rad, linear);

        // Sideways slip
        let mut offset = 0.0;
        if let Some(ref mut t) = self.tracker {
            displacement += Vec2::from_dir_and_mag(heading_rad + FRAC_PI_2, t.travel());
            offset = t.offset();
        }

        let mut s = lock(&self.state);

        match pending_position {
            Some(p) => {
                debug!("Setting position to ({:.2}, {:.2})", p.x(), p.y());
                s.pose.position = p;
            },
            None => s.pose.position += displacement
        }

        s.pose.center_position = s.pose.position
            + Vec2::from_dir_and_mag(heading_rad, offset);
        s.pose.heading_deg = heading_deg;

        trace!(
            "pos ({:.3}, {:.3}) in, heading {:.2} deg",
            s.pose.position.x(), s.pose.position.y(), heading_deg
        );

        s.pose
    }

    /// Latest estimated pose.
    pub fn pose(&self) -> Pose {
        lock(&self.state).pose
    }

    /// Overwrite the heading at the next step.
    pub fn set_heading(&self, heading_deg: f64) {
        lock(&self.state).pending_heading = Some(heading_deg);
    }

    /// Overwrite the position at the next step.
    pub fn set_position(&self, position: Vec2) {
        lock(&self.state).pending_position = Some(position);
    }

    /// Start estimating on a background thread.
    pub fn start(self) -> Result<OdomHandle, OdomError> {
        let state = self.state.clone();
        let run = Arc::new(AtomicBool::new(true));
        let tracking = Arc::new(AtomicBool::new(false));

        let run_clone = run.clone();
        let tracking_clone = tracking.clone();

        let join_handle = thread::Builder::new()
            .name("odometry".into())
            .spawn(move || self.run(run_clone, tracking_clone))
            .map_err(OdomError::CannotSpawnThread)?;

        info!("Odometry started");

        Ok(OdomHandle {
            state,
            run,
            tracking,
            join_handle: Some(join_handle),
        })
    }

    /// Body of the estimator thread.
    fn run(mut self, run: Arc<AtomicBool>, tracking: Arc<AtomicBool>) -> Self {

        // ---- CALIBRATING ----

        while run.load(Ordering::Relaxed) && lock(&self.imu).is_calibrating() {
            thread::sleep(self.cycle_period);
        }

        if !run.load(Ordering::Relaxed) {
            return self;
        }

        debug!("Heading sensor calibrated, tracking");

        // ---- TRACKING ----

        self.seed();
        tracking.store(true, Ordering::Relaxed);

        while run.load(Ordering::Relaxed) {
            self.step();
            thread::sleep(self.cycle_period);
        }

        tracking.store(false, Ordering::Relaxed);

        self
    }
}

impl OdomHandle {

    /// Latest estimated pose.
    pub fn pose(&self) -> Pose {
        lock(&self.state).pose
    }

    pub fn position(&self) -> Vec2 {
        self.pose().position
    }

    pub fn center_position(&self) -> Vec2 {
        self.pose().center_position
    }

    pub fn heading(&self) -> f64 {
        self.pose().heading_deg
    }

    /// Overwrite the heading at the start of the next cycle.
    pub fn set_heading(&self, heading_deg: f64) {
        lock(&self.state).pending_heading = Some(heading_deg);
    }

    /// Overwrite the position at the start of the next cycle.
    pub fn set_position(&self, position: Vec2) {
        lock(&self.state).pending_position = Some(position);
    }

    /// Create a reader which can be sent to another thread.
    pub fn reader(&self) -> PoseReader {
        PoseReader {
            state: self.state.clone()
        }
    }

    /// True once calibration has finished and until the estimator is
    /// stopped.
    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::Relaxed)
    }

    /// Stop the estimator, returning it so that it can be restarted.
    pub fn stop(mut self) -> Result<Odometry, OdomError> {
        self.join()
    }

    fn join(&mut self) -> Result<Odometry, OdomError> {
        self.run.store(false, Ordering::Relaxed);

        let odom = self.join_handle
            .take()
            .ok_or(OdomError::AlreadyStopped)?
            .join()
            .map_err(|_| OdomError::ThreadPanicked)?;

        info!("Odometry stopped");

        Ok(odom)
    }
}

impl PoseReader {
    pub fn pose(&self) -> Pose {
        lock(&self.state).pose
    }
}

impl Drop for OdomHandle {
    fn drop(&mut self) {
        if self.join_handle.is_some() {
            self.join().ok();
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::{test::test_params, TrackerParams};
    use crate::sim::{SimParams, SimRobot};
    use crate::tank_drive::TankDrive;
    use std::f64::consts::PI;

    fn odometry(robot: &SimRobot, params: &DriveParams) -> Odometry {
        let tracker = params.tracker.map(|p| HorizontalTracker::new(robot.tracker_encoder(), p));

        Odometry::new(
            robot.left_motors(),
            robot.right_motors(),
            robot.imu(),
            tracker,
            params
        ).unwrap()
    }

    #[test]
    fn test_straight_line() {
        let robot = SimRobot::manual(SimParams::default());
        let params = test_params();
        let mut odom = odometry(&robot, &params);
        let mut drive = TankDrive::new(robot.left_motors(), robot.right_motors());

        drive.arcade(50.0, 0.0);
        robot.advance(1.0);
        let pose = odom.step();

        // Wheel revolutions driven, times travel per revolution
        let revs = robot.left_angle() / 360.0;
        assert!(revs > 1.0);
        assert!((pose.position.y() - revs * PI * 3.25).abs() < 1e-6);
        assert!(pose.position.x().abs() < 1e-6);
        assert_eq!(pose.center_position, pose.position);
        assert!(pose.heading_deg.abs() < 1e-9);

        // And it agrees with where the robot actually is
        assert!((pose.position - robot.true_position()).magnitude() < 1e-6);
    }

    #[test]
    fn test_straight_line_geared() {
        let mut sim_params = SimParams::default();
        sim_params.gear_ratio = 0.6;
        let robot = SimRobot::manual(sim_params);

        let params = DriveParams { gear_ratio: 0.6, ..test_params() };
        let mut odom = odometry(&robot, &params);
        let mut drive = TankDrive::new(robot.left_motors(), robot.right_motors());

        drive.arcade(50.0, 0.0);
        robot.advance(1.0);
        let pose = odom.step();

        // Only 0.6 of a wheel turn per encoder revolution
        let revs = robot.left_angle() / 360.0;
        assert!(revs > 1.0);
        assert!((pose.position.y() - revs * PI * 3.25 * 0.6).abs() < 1e-6);
        assert!((pose.position - robot.true_position()).magnitude() < 1e-6);
    }

    #[test]
    fn test_point_turn() {
        let robot = SimRobot::manual(SimParams::default());
        let mut odom = odometry(&robot, &test_params());
        let mut drive = TankDrive::new(robot.left_motors(), robot.right_motors());

        drive.arcade(0.0, 20.0);
        robot.advance(0.2);
        let pose = odom.step();

        assert!(pose.position.magnitude() < 1e-6);
        assert!((pose.heading_deg - robot.true_heading_deg()).abs() < 1e-6);
        assert!(pose.heading_deg > 0.0);
    }

    #[test]
    fn test_arc_tracks_truth() {
        let robot = SimRobot::manual(SimParams::default());
        let mut odom = odometry(&robot, &test_params());
        let mut drive = TankDrive::new(robot.left_motors(), robot.right_motors());

        drive.tank(30.0, 20.0);
        for _ in 0..400 {
            robot.advance(0.005);
            odom.step();
        }

        let pose = odom.pose();
        let truth = robot.true_position();
        assert!(truth.magnitude() > 10.0);
        assert!((pose.position - truth).magnitude() < 0.05 * truth.magnitude());
    }

    #[test]
    fn test_tracker_slip() {
        let mut sim_params = SimParams::default();
        sim_params.lateral_slip_in_per_s = 2.0;
        let robot = SimRobot::manual(sim_params);

        let mut params = test_params();
        params.tracker = Some(TrackerParams {
            wheel_diameter_in: 2.75,
            gear_ratio: 1.0,
            offset_in: 2.0,
        });
        let mut odom = odometry(&robot, &params);

        robot.advance(1.5);
        let pose = odom.step();

        // Pure sideways slip to the right at heading 0
        assert!((pose.position.x() - 3.0).abs() < 1e-6);
        assert!(pose.position.y().abs() < 1e-6);

        // Centre is ahead of the tracking point along the heading
        assert!((pose.center_position - Vec2::from_xy(3.0, 2.0)).magnitude() < 1e-6);
    }

    #[test]
    fn test_point_turn_with_offset_tracker() {
        let mut sim_params = SimParams::default();
        sim_params.tracker_offset_in = 2.0;
        let robot = SimRobot::manual(sim_params);

        let mut params = test_params();
        params.tracker = Some(TrackerParams {
            wheel_diameter_in: 2.75,
            gear_ratio: 1.0,
            offset_in: 2.0,
        });
        let mut odom = odometry(&robot, &params);
        let mut drive = TankDrive::new(robot.left_motors(), robot.right_motors());

        drive.arcade(0.0, 20.0);
        for _ in 0..100 {
            robot.advance(0.005);
            odom.step();
        }

        // The tracking point swings round the centre, which stays put
        let pose = odom.pose();
        assert!(pose.heading_deg > 45.0);
        assert!((pose.center_position - Vec2::from_xy(0.0, 2.0)).magnitude() < 0.1);
        assert!((pose.center_position.distance_to(pose.position) - 2.0).abs() < 1e-9);
        assert!(pose.position.magnitude() > 1.0);
    }

    #[test]
    fn test_center_offset_follows_heading() {
        let robot = SimRobot::manual(SimParams::default());
        let mut params = test_params();
        params.tracker = Some(TrackerParams {
            wheel_diameter_in: 2.75,
            gear_ratio: 1.0,
            offset_in: 2.0,
        });
        let mut odom = odometry(&robot, &params);

        odom.set_heading(90.0);
        let pose = odom.step();

        assert!((pose.heading_deg - 90.0).abs() < 1e-9);
        assert!((pose.center_position - Vec2::from_xy(2.0, 0.0)).magnitude() < 1e-9);
    }

    #[test]
    fn test_overrides() {
        let robot = SimRobot::manual(SimParams::default());
        let mut odom = odometry(&robot, &test_params());
        let mut drive = TankDrive::new(robot.left_motors(), robot.right_motors());

        odom.set_heading(90.0);
        odom.set_position(Vec2::from_xy(10.0, -5.0));
        let pose = odom.step();
        assert_eq!(pose.position, Vec2::from_xy(10.0, -5.0));
        assert!((pose.heading_deg - 90.0).abs() < 1e-9);

        // The heading override went to the sensor, so driving forward now
        // moves along +X
        drive.arcade(50.0, 0.0);
        robot.advance(0.5);
        let pose = odom.step();
        assert!(pose.position.x() > 10.0);
        assert!((pose.position.y() + 5.0).abs() < 1e-6);

        // Overrides are applied once
        drive.stop();
        let before = odom.step();
        assert_eq!(odom.step(), before);
    }

    #[test]
    fn test_seed_ignores_earlier_movement() {
        let robot = SimRobot::manual(SimParams::default());
        let mut drive = TankDrive::new(robot.left_motors(), robot.right_motors());

        drive.arcade(50.0, 0.0);
        robot.advance(1.0);
        drive.stop();

        let mut odom = odometry(&robot, &test_params());
        let pose = odom.step();
        assert!(pose.position.magnitude() < 1e-9);
    }

    #[test]
    fn test_thread_lifecycle() -> Result<(), OdomError> {
        let mut sim_params = SimParams::default();
        sim_params.calibration_time_s = 0.1;
        let robot = SimRobot::new(sim_params);
        lock(&robot.imu()).calibrate();

        let odom = odometry(&robot, &test_params());
        let handle = odom.start()?;

        // Still calibrating
        assert!(!handle.is_tracking());

        thread::sleep(Duration::from_millis(250));
        assert!(handle.is_tracking());

        let mut drive = TankDrive::new(robot.left_motors(), robot.right_motors());
        drive.arcade(40.0, 0.0);
        thread::sleep(Duration::from_millis(200));
        drive.stop();
        thread::sleep(Duration::from_millis(50));

        let pose = handle.pose();
        assert!(pose.position.y() > 1.0);
        assert!((pose.position - robot.true_position()).magnitude() < 0.5);

        handle.set_position(Vec2::default());
        handle.set_heading(180.0);
        thread::sleep(Duration::from_millis(50));
        assert!(handle.position().magnitude() < 1e-6);
        assert!((handle.heading() - 180.0).abs() < 0.1);
        assert_eq!(handle.center_position(), handle.position());

        let reader = handle.reader();
        let reader_pose = thread::spawn(move || reader.pose()).join().unwrap();
        assert!(reader_pose.position.magnitude() < 1e-6);

        let odom = handle.stop()?;
        assert!((odom.pose().heading_deg - 180.0).abs() < 0.1);

        Ok(())
    }
}
