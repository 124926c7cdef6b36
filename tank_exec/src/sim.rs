//! # Simulated robot
//!
//! A kinematic differential drive model implementing every device trait, so
//! that the control core and the executable can run without hardware.
//!
//! The model has no dynamics: each side's wheels turn at the commanded
//! fraction of the maximum speed as soon as the command is given. Commands
//! are saturated to `[-100, 100]` as real motor controllers do. Heading
//! changes with the difference in side speeds over the track width, and an
//! optional constant sideways slip can be applied to exercise the tracking
//! wheel.
//!
//! Two time sources are supported. A robot created with [`SimRobot::new`]
//! follows the wall clock, advancing whenever any of its devices is accessed.
//! One created with [`SimRobot::manual`] only moves when [`SimRobot::advance`]
//! is called, which keeps tests deterministic.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::time::Instant;
use serde::Deserialize;

// Internal
use util::maths::{clamp, rad_to_deg, wrap_heading_deg};
use crate::devices::{lock, shared, HeadingSensor, Motor, OperatorInput, RotarySensor, Shared};
use crate::vec2::Vec2;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Longest integration step, seconds.
const MAX_STEP_S: f64 = 0.001;

/// Motor commands saturate at this percentage.
const MAX_CMD_PCT: f64 = 100.0;

/// Encoder degrees per second per RPM.
const DEG_S_PER_RPM: f64 = 6.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Physical properties of the simulated robot.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SimParams {
    /// Encoder speed at 100 percent command.
    ///
    /// Units: revolutions per minute
    pub max_rpm: f64,

    /// Distance between the left and right wheels.
    ///
    /// Units: inches
    pub track_width_in: f64,

    /// Units: inches
    pub wheel_diameter_in: f64,

    pub gear_ratio: f64,

    /// Units: inches
    pub tracker_wheel_diameter_in: f64,

    pub tracker_gear_ratio: f64,

    /// Distance from the tracking wheel to the centre of rotation, along the
    /// heading. Positive when the wheel is behind the centre.
    ///
    /// Units: inches
    #[serde(default)]
    pub tracker_offset_in: f64,

    /// How long the heading sensor takes to calibrate.
    ///
    /// Units: seconds
    pub calibration_time_s: f64,

    /// Constant sideways slip, positive to the right of the robot.
    ///
    /// Units: inches per second
    #[serde(default)]
    pub lateral_slip_in_per_s: f64,
}

/// Handle to a simulated robot, used to build its devices and to inspect the
/// true state.
#[derive(Clone)]
pub struct SimRobot {
    world: Shared<World>,
}

/// One side of the simulated drive.
pub struct SimMotorGroup {
    world: Shared<World>,
    side: Side,
}

/// The simulated inertial sensor.
pub struct SimImu {
    world: Shared<World>,
}

/// The simulated horizontal tracking wheel encoder.
pub struct SimEncoder {
    world: Shared<World>,
}

/// A joystick with fixed axis positions.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimJoystick {
    pub forward: f64,
    pub turn: f64,
}

/// True state of the simulation.
struct World {
    params: SimParams,

    /// `None` when time only moves through `SimRobot::advance`.
    last_sync: Option<Instant>,
    time_s: f64,

    position: Vec2,
    heading_rad: f64,

    left: SideState,
    right: SideState,
    tracker_angle_deg: f64,

    mode: CommandMode,

    heading_offset_deg: f64,
    calibrated_at_s: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct SideState {
    cmd: f64,
    angle_deg: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How the motors were last commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    Effort,
    Velocity,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            max_rpm: 600.0,
            track_width_in: 12.0,
            wheel_diameter_in: 3.25,
            gear_ratio: 1.0,
            tracker_wheel_diameter_in: 2.75,
            tracker_gear_ratio: 1.0,
            tracker_offset_in: 0.0,
            calibration_time_s: 0.0,
            lateral_slip_in_per_s: 0.0,
        }
    }
}

impl SimRobot {

    /// Create a robot following the wall clock.
    pub fn new(params: SimParams) -> Self {
        Self::build(params, Some(Instant::now()))
    }

    /// Create a robot which only moves when `advance` is called.
    pub fn manual(params: SimParams) -> Self {
        Self::build(params, None)
    }

    fn build(params: SimParams, last_sync: Option<Instant>) -> Self {
        Self {
            world: shared(World {
                params,
                last_sync,
                time_s: 0.0,
                position: Vec2::default(),
                heading_rad: 0.0,
                left: SideState::default(),
                right: SideState::default(),
                tracker_angle_deg: 0.0,
                mode: CommandMode::Effort,
                heading_offset_deg: 0.0,
                calibrated_at_s: 0.0,
            })
        }
    }

    pub fn left_motors(&self) -> Shared<SimMotorGroup> {
        shared(SimMotorGroup { world: self.world.clone(), side: Side::Left })
    }

    pub fn right_motors(&self) -> Shared<SimMotorGroup> {
        shared(SimMotorGroup { world: self.world.clone(), side: Side::Right })
    }

    pub fn imu(&self) -> Shared<SimImu> {
        shared(SimImu { world: self.world.clone() })
    }

    pub fn tracker_encoder(&self) -> Shared<SimEncoder> {
        shared(SimEncoder { world: self.world.clone() })
    }

    /// Move simulated time forward.
    ///
    /// For a wall clock robot this is in addition to real time.
    pub fn advance(&self, dt_s: f64) {
        lock(&self.world).integrate(dt_s);
    }

    /// Simulated seconds since creation.
    pub fn time_s(&self) -> f64 {
        self.synced(|w| w.time_s)
    }

    /// Saturated left side command.
    pub fn left_cmd(&self) -> f64 {
        self.synced(|w| w.left.cmd)
    }

    /// Saturated right side command.
    pub fn right_cmd(&self) -> f64 {
        self.synced(|w| w.right.cmd)
    }

    pub fn command_mode(&self) -> CommandMode {
        self.synced(|w| w.mode)
    }

    /// Left encoder angle in degrees.
    pub fn left_angle(&self) -> f64 {
        self.synced(|w| w.left.angle_deg)
    }

    /// True position of the robot centre, inches.
    pub fn true_position(&self) -> Vec2 {
        self.synced(|w| w.position)
    }

    /// True heading, unwrapped, degrees.
    pub fn true_heading_deg(&self) -> f64 {
        self.synced(|w| rad_to_deg(w.heading_rad))
    }

    pub fn set_lateral_slip(&self, slip_in_per_s: f64) {
        lock(&self.world).params.lateral_slip_in_per_s = slip_in_per_s;
    }

    fn synced<T, F: FnOnce(&World) -> T>(&self, f: F) -> T {
        let mut w = lock(&self.world);
        w.sync();
        f(&*w)
    }
}

impl World {

    /// Catch up with the wall clock, if following it.
    fn sync(&mut self) {
        if let Some(last) = self.last_sync {
            let now = Instant::now();
            self.last_sync = Some(now);
            self.integrate((now - last).as_secs_f64());
        }
    }

    fn integrate(&mut self, dt_s: f64) {
        let mut remaining = dt_s;

        while remaining > 0.0 {
            let dt = remaining.min(MAX_STEP_S);
            remaining -= dt;
            self.step(dt);
        }
    }

    fn step(&mut self, dt: f64) {
        let p = &self.params;

        // Encoder rates
        let rate = |cmd: f64| cmd / MAX_CMD_PCT * p.max_rpm * DEG_S_PER_RPM;
        let left_rate = rate(self.left.cmd);
        let right_rate = rate(self.right.cmd);

        // Linear wheel speeds
        let travel_per_deg = std::f64::consts::PI * p.wheel_diameter_in * p.gear_ratio / 360.0;
        let v_left = left_rate * travel_per_deg;
        let v_right = right_rate * travel_per_deg;
        let v = (v_left + v_right) / 2.0;
        let omega = (v_left - v_right) / p.track_width_in;
        let slip = p.lateral_slip_in_per_s;

        let h = self.heading_rad;
        self.position += Vec2::from_xy(
            v * h.sin() + slip * h.cos(),
            v * h.cos() - slip * h.sin()
        ) * dt;
        self.heading_rad += omega * dt;

        self.left.angle_deg += left_rate * dt;
        self.right.angle_deg += right_rate * dt;
        // A wheel away from the centre of rotation also rolls as the robot
        // turns
        let tracker_speed = slip - p.tracker_offset_in * omega;
        self.tracker_angle_deg += rad_to_deg(
            tracker_speed / (p.tracker_wheel_diameter_in / 2.0) / p.tracker_gear_ratio
        ) * dt;

        self.time_s += dt;
    }

    fn side(&mut self, side: Side) -> &mut SideState {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    fn command(&mut self, side: Side, pct: f64, mode: CommandMode) {
        self.sync();
        self.mode = mode;
        self.side(side).cmd = clamp(pct, -MAX_CMD_PCT, MAX_CMD_PCT);
    }
}

impl Motor for SimMotorGroup {
    fn set_effort(&mut self, pct: f64) {
        lock(&self.world).command(self.side, pct, CommandMode::Effort);
    }

    fn set_velocity(&mut self, pct: f64) {
        lock(&self.world).command(self.side, pct, CommandMode::Velocity);
    }
}

impl RotarySensor for SimMotorGroup {
    fn angle(&self) -> f64 {
        let mut w = lock(&self.world);
        w.sync();
        w.side(self.side).angle_deg
    }

    fn reset_angle(&mut self) {
        let mut w = lock(&self.world);
        w.sync();
        w.side(self.side).angle_deg = 0.0;
    }
}

impl HeadingSensor for SimImu {
    fn heading(&self) -> f64 {
        let mut w = lock(&self.world);
        w.sync();
        wrap_heading_deg(rad_to_deg(w.heading_rad) + w.heading_offset_deg)
    }

    fn rotation(&self) -> f64 {
        let mut w = lock(&self.world);
        w.sync();
        rad_to_deg(w.heading_rad)
    }

    fn set_heading(&mut self, heading_deg: f64) {
        let mut w = lock(&self.world);
        w.sync();
        w.heading_offset_deg = heading_deg - rad_to_deg(w.heading_rad);
    }

    fn is_calibrating(&self) -> bool {
        let mut w = lock(&self.world);
        w.sync();
        w.time_s < w.calibrated_at_s
    }

    fn calibrate(&mut self) {
        let mut w = lock(&self.world);
        w.sync();
        w.heading_offset_deg = -rad_to_deg(w.heading_rad);
        w.calibrated_at_s = w.time_s + w.params.calibration_time_s;
    }
}

impl SimEncoder {
    /// Force the encoder to read the given angle.
    pub fn set_angle(&mut self, angle_deg: f64) {
        let mut w = lock(&self.world);
        w.sync();
        w.tracker_angle_deg = angle_deg;
    }
}

impl RotarySensor for SimEncoder {
    fn angle(&self) -> f64 {
        let mut w = lock(&self.world);
        w.sync();
        w.tracker_angle_deg
    }

    fn reset_angle(&mut self) {
        self.set_angle(0.0);
    }
}

impl OperatorInput for SimJoystick {
    fn forward_axis(&self) -> f64 {
        self.forward
    }

    fn turn_axis(&self) -> f64 {
        self.turn
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
