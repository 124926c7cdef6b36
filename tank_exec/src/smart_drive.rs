//! # Smart drive
//!
//! Blocking drive and turn primitives built on a [`TankDrive`], the heading
//! sensor and three PID controllers.
//!
//! Each primitive comes in an open loop form, which drives at a fixed speed
//! until the target is crossed, and a closed loop form, which runs its
//! controller until the controller reports completion. All of them poll at
//! the configured cycle period and block the calling thread.
//!
//! Distances are in inches and angles in degrees. Open loop speeds are
//! percentages whose sign is ignored, the direction always comes from the
//! target.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::thread;
use std::time::Duration;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

// Internal
use util::maths::{rev_to_deg, shortest_turn_path_deg, sign};
use crate::devices::{lock, HeadingSensor, Shared};
use crate::params::{ConfigError, DriveParams};
use crate::pid::PidController;
use crate::tank_drive::TankDrive;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A drive with motion primitives.
pub struct SmartDrive {
    drive: TankDrive,
    imu: Shared<dyn HeadingSensor>,
    params: DriveParams,

    drive_pid: PidController,
    turn_for_pid: PidController,
    turn_to_pid: PidController,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// One step of a scripted routine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "motion", rename_all = "snake_case")]
pub enum Motion {
    DriveFor { distance_in: f64, speed: f64 },
    DriveForPid { distance_in: f64 },
    TurnFor { angle_deg: f64, speed: f64 },
    TurnForPid { angle_deg: f64 },
    TurnTo { heading_deg: f64, speed: f64 },
    TurnToPid { heading_deg: f64 },
    Stop,
    Wait { duration_s: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SmartDrive {

    /// Create a new smart drive, checking that the parameters describe a
    /// usable drive and that every controller can complete.
    pub fn new(
        drive: TankDrive,
        imu: Shared<dyn HeadingSensor>,
        params: DriveParams
    ) -> Result<Self, ConfigError> {
        params.validate()?;

        Ok(Self {
            drive,
            imu,
            drive_pid: PidController::from_params(&params.drive_pid),
            turn_for_pid: PidController::from_params(&params.turn_for_pid),
            turn_to_pid: PidController::from_params(&params.turn_to_pid),
            params,
        })
    }

    // ---- DELEGATED ----

    pub fn arcade(&mut self, forward: f64, rotate: f64) {
        self.drive.arcade(forward, rotate);
    }

    pub fn tank(&mut self, left: f64, right: f64) {
        self.drive.tank(left, right);
    }

    pub fn stop(&mut self) {
        self.drive.stop();
    }

    pub fn drive(&self) -> &TankDrive {
        &self.drive
    }

    /// Distance travelled per encoder revolution, inches.
    pub fn wheel_travel(&self) -> f64 {
        self.params.wheel_travel_in()
    }

    // ---- PRIMITIVES ----

    /// Drive `distance` inches at `speed` percent without feedback control.
    ///
    /// Returns once the average encoder position passes the target. The
    /// motors are left running so that consecutive motions blend.
    pub fn drive_for(&mut self, distance: f64, speed: f64) {
        let dir = sign(distance);
        let target = self.wheel_angle_target(distance);

        debug!("drive_for {:.2} in at {:.1} %, target {:.1} deg", distance, speed, target);

        if dir == 0.0 {
            return;
        }

        while (self.drive.average_position() - target) * dir < 0.0 {
            self.drive.arcade(speed.abs() * dir, 0.0);
            self.wait_cycle();
        }

        debug!("drive_for complete at {:.1} deg", self.drive.average_position());
    }

    /// Drive `distance` inches under PID control, then stop.
    pub fn drive_for_pid(&mut self, distance: f64) {
        let target = self.wheel_angle_target(distance);

        debug!("drive_for_pid {:.2} in, target {:.1} deg", distance, target);

        self.drive_pid.reset();

        while !self.drive_pid.is_completed() {
            let output = self.drive_pid.calculate_target(target, self.drive.average_position());
            trace!("drive_for_pid error {:.2} output {:.2}", self.drive_pid.error(), output);

            self.drive.arcade(output, 0.0);
            self.wait_cycle();
        }

        self.drive.stop();

        debug!(
            "drive_for_pid complete after {:.2} s, error {:.2} deg",
            self.drive_pid.time_passed(),
            target - self.drive.average_position()
        );
    }

    /// Turn by `angle` degrees (positive clockwise) at `speed` percent
    /// without feedback control, then stop.
    ///
    /// The turn is relative to the current rotation and is not wrapped, so
    /// 720 turns twice.
    pub fn turn_for(&mut self, angle: f64, speed: f64) {
        let dir = sign(angle);
        let target = self.rotation() + angle;

        debug!("turn_for {:.1} deg at {:.1} %, target {:.1} deg", angle, speed, target);

        if dir != 0.0 {
            while (self.rotation() - target) * dir < 0.0 {
                self.drive.arcade(0.0, speed.abs() * dir);
                self.wait_cycle();
            }
        }

        self.drive.stop();

        debug!("turn_for complete at {:.1} deg", self.rotation());
    }

    /// Turn by `angle` degrees under PID control, then stop.
    pub fn turn_for_pid(&mut self, angle: f64) {
        let target = self.rotation() + angle;

        debug!("turn_for_pid {:.1} deg, target {:.1} deg", angle, target);

        self.turn_for_pid.reset();

        while !self.turn_for_pid.is_completed() {
            let output = self.turn_for_pid.calculate_target(target, self.rotation());
            trace!("turn_for_pid error {:.2} output {:.2}", self.turn_for_pid.error(), output);

            self.drive.arcade(0.0, output);
            self.wait_cycle();
        }

        self.drive.stop();

        debug!(
            "turn_for_pid complete after {:.2} s, error {:.2} deg",
            self.turn_for_pid.time_passed(),
            target - self.rotation()
        );
    }

    /// Turn to the absolute heading `angle` the shorter way round at `speed`
    /// percent without feedback control, then stop.
    ///
    /// Stops inside the fine threshold, or inside the coarse threshold once
    /// the error has changed sign.
    pub fn turn_to(&mut self, angle: f64, speed: f64) {
        debug!("turn_to {:.1} deg at {:.1} %", angle, speed);

        let fine = self.params.turn_to_fine_deg;
        let coarse = self.params.turn_to_coarse_deg;
        let mut prev_error: Option<f64> = None;

        loop {
            let error = self.heading_error(angle);

            if error.abs() < fine {
                break;
            }

            if let Some(prev) = prev_error {
                if error.abs() < coarse && sign(error) != sign(prev) {
                    debug!("turn_to overshot, stopping with error {:.2} deg", error);
                    break;
                }
            }

            self.drive.arcade(0.0, speed.abs() * sign(error));
            prev_error = Some(error);

            self.wait_cycle();
        }

        self.drive.stop();

        debug!("turn_to complete at {:.1} deg", self.heading());
    }

    /// Turn to the absolute heading `angle` the shorter way round under PID
    /// control, then stop.
    pub fn turn_to_pid(&mut self, angle: f64) {
        debug!("turn_to_pid {:.1} deg", angle);

        self.turn_to_pid.reset();

        while !self.turn_to_pid.is_completed() {
            let error = self.heading_error(angle);
            let output = self.turn_to_pid.calculate(error);
            trace!("turn_to_pid error {:.2} output {:.2}", error, output);

            self.drive.arcade(0.0, output);
            self.wait_cycle();
        }

        self.drive.stop();

        debug!(
            "turn_to_pid complete after {:.2} s, heading {:.1} deg",
            self.turn_to_pid.time_passed(),
            self.heading()
        );
    }

    /// Run one step of a routine.
    pub fn execute(&mut self, motion: Motion) {
        match motion {
            Motion::DriveFor { distance_in, speed } => self.drive_for(distance_in, speed),
            Motion::DriveForPid { distance_in } => self.drive_for_pid(distance_in),
            Motion::TurnFor { angle_deg, speed } => self.turn_for(angle_deg, speed),
            Motion::TurnForPid { angle_deg } => self.turn_for_pid(angle_deg),
            Motion::TurnTo { heading_deg, speed } => self.turn_to(heading_deg, speed),
            Motion::TurnToPid { heading_deg } => self.turn_to_pid(heading_deg),
            Motion::Stop => self.stop(),
            Motion::Wait { duration_s } => match Duration::try_from_secs_f64(duration_s) {
                Ok(d) => thread::sleep(d),
                Err(e) => warn!("Cannot wait for {} s: {}", duration_s, e)
            }
        }
    }

    // ---- HELPERS ----

    /// Encoder angle at which the drive will have travelled `distance`.
    fn wheel_angle_target(&self, distance: f64) -> f64 {
        rev_to_deg(distance / self.wheel_travel()) + self.drive.average_position()
    }

    fn heading_error(&self, target: f64) -> f64 {
        shortest_turn_path_deg(target - self.heading())
    }

    fn heading(&self) -> f64 {
        lock(&self.imu).heading()
    }

    fn rotation(&self) -> f64 {
        lock(&self.imu).rotation()
    }

    fn wait_cycle(&self) {
        thread::sleep(self.params.cycle_period());
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
