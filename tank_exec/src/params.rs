//! # Drive parameters
//!
//! Geometry, tracking and controller parameters for the drive, loaded from a
//! TOML file with `util::params`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::time::Duration;
use serde::{Deserialize, Serialize};

// Internal
use util::time::millis_to_duration;
use crate::pid::PidController;
use crate::sim::SimParams;
use crate::smart_drive::Motion;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default period of the odometry and motion polling loops.
pub const DEFAULT_CYCLE_PERIOD_MS: f64 = 20.0;

/// Default period between pose archive records.
pub const DEFAULT_ARCHIVE_PERIOD_MS: f64 = 50.0;

/// Default band inside which an open loop `turn_to` stops.
pub const DEFAULT_TURN_TO_FINE_DEG: f64 = 5.0;

/// Default band inside which an open loop `turn_to` stops once it has
/// overshot the target.
pub const DEFAULT_TURN_TO_COARSE_DEG: f64 = 10.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the tank executable.
#[derive(Debug, Clone, Deserialize)]
pub struct TankExecParams {
    /// Command velocity rather than effort percentages.
    #[serde(default)]
    pub speed_mode: bool,

    /// Period between pose archive records.
    ///
    /// Units: milliseconds
    #[serde(default = "default_archive_period_ms")]
    pub archive_period_ms: f64,

    pub drive: DriveParams,

    pub sim: SimParams,

    /// Motions run in order, once odometry is tracking.
    #[serde(default)]
    pub routine: Vec<Motion>,
}

/// Parameters for the drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveParams {

    // ---- GEOMETRY ----

    /// Diameter of the drive wheels.
    ///
    /// Units: inches
    pub wheel_diameter_in: f64,

    /// Wheel revolutions per encoder revolution.
    pub gear_ratio: f64,

    /// Optional lateral tracking wheel.
    #[serde(default)]
    pub tracker: Option<TrackerParams>,

    // ---- TIMING ----

    /// Period of the odometry and motion loops.
    ///
    /// Units: milliseconds
    #[serde(default = "default_cycle_period_ms")]
    pub cycle_period_ms: f64,

    // ---- TURN TO ----

    /// Open loop `turn_to` stops when the heading error is below this.
    ///
    /// Units: degrees
    #[serde(default = "default_turn_to_fine_deg")]
    pub turn_to_fine_deg: f64,

    /// Open loop `turn_to` also stops when the heading error is below this
    /// and has changed sign since the previous cycle.
    ///
    /// Units: degrees
    #[serde(default = "default_turn_to_coarse_deg")]
    pub turn_to_coarse_deg: f64,

    // ---- CONTROLLERS ----

    /// Controller for `drive_for_pid`, error in degrees of wheel rotation.
    pub drive_pid: PidParams,

    /// Controller for `turn_for_pid`, error in degrees.
    pub turn_for_pid: PidParams,

    /// Controller for `turn_to_pid`, error in degrees.
    pub turn_to_pid: PidParams,
}

/// Parameters for the lateral tracking wheel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrackerParams {
    /// Units: inches
    pub wheel_diameter_in: f64,

    /// Wheel revolutions per encoder revolution.
    pub gear_ratio: f64,

    /// Distance from the tracking point to the robot's geometric centre,
    /// along the heading.
    ///
    /// Units: inches
    #[serde(default)]
    pub offset_in: f64,
}

/// Gains, zones and timeouts of a PID controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidParams {
    pub kp: f64,

    #[serde(default)]
    pub ki: f64,

    /// Derivative gain, applied to `prev_error - error`.
    #[serde(default)]
    pub kd: f64,

    #[serde(default)]
    pub ff: f64,

    #[serde(default)]
    pub integral_zone: f64,

    #[serde(default)]
    pub settle_zone: f64,

    /// Units: seconds, 0 disables
    #[serde(default)]
    pub timeout_s: f64,

    /// Units: seconds, 0 disables
    #[serde(default)]
    pub settle_timeout_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Invalid drive configuration, reported at setup time.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Wheel diameter must be finite and positive, found {0}")]
    InvalidWheelDiameter(f64),

    #[error("Gear ratio must be finite and non-zero, found {0}")]
    InvalidGearRatio(f64),

    #[error("Tracker wheel diameter must be finite and positive, found {0}")]
    InvalidTrackerWheelDiameter(f64),

    #[error("Tracker gear ratio must be finite and non-zero, found {0}")]
    InvalidTrackerGearRatio(f64),

    #[error("Cycle period must be finite and positive, found {0} ms")]
    InvalidCyclePeriod(f64),

    #[error("Turn-to thresholds must satisfy 0 < fine ({0}) <= coarse ({1})")]
    InvalidTurnToThresholds(f64, f64),

    #[error("The {0} controller has neither a timeout nor a settle timeout and would never complete")]
    PidNeverCompletes(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveParams {

    /// Check the parameters describe a usable drive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.wheel_diameter_in.is_finite() && self.wheel_diameter_in > 0.0) {
            return Err(ConfigError::InvalidWheelDiameter(self.wheel_diameter_in));
        }
        if !(self.gear_ratio.is_finite() && self.gear_ratio != 0.0) {
            return Err(ConfigError::InvalidGearRatio(self.gear_ratio));
        }

        if let Some(ref t) = self.tracker {
            t.validate()?;
        }

        if !(self.cycle_period_ms.is_finite() && self.cycle_period_ms > 0.0) {
            return Err(ConfigError::InvalidCyclePeriod(self.cycle_period_ms));
        }

        if !(self.turn_to_fine_deg > 0.0 && self.turn_to_fine_deg <= self.turn_to_coarse_deg) {
            return Err(ConfigError::InvalidTurnToThresholds(
                self.turn_to_fine_deg,
                self.turn_to_coarse_deg
            ));
        }

        for (name, pid) in [
            ("drive", &self.drive_pid),
            ("turn for", &self.turn_for_pid),
            ("turn to", &self.turn_to_pid)
        ].iter() {
            if !PidController::from_params(pid).has_completion_criteria() {
                return Err(ConfigError::PidNeverCompletes(name));
            }
        }

        Ok(())
    }

    /// The loop period as a duration.
    pub fn cycle_period(&self) -> Duration {
        millis_to_duration(self.cycle_period_ms)
    }

    /// Distance travelled per revolution of the drive encoders.
    ///
    /// Units: inches
    pub fn wheel_travel_in(&self) -> f64 {
        std::f64::consts::PI * self.wheel_diameter_in * self.gear_ratio
    }
}

impl TrackerParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.wheel_diameter_in.is_finite() && self.wheel_diameter_in > 0.0) {
            return Err(ConfigError::InvalidTrackerWheelDiameter(self.wheel_diameter_in));
        }
        if !(self.gear_ratio.is_finite() && self.gear_ratio != 0.0) {
            return Err(ConfigError::InvalidTrackerGearRatio(self.gear_ratio));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_archive_period_ms() -> f64 {
    DEFAULT_ARCHIVE_PERIOD_MS
}

fn default_cycle_period_ms() -> f64 {
    DEFAULT_CYCLE_PERIOD_MS
}

fn default_turn_to_fine_deg() -> f64 {
    DEFAULT_TURN_TO_FINE_DEG
}

fn default_turn_to_coarse_deg() -> f64 {
    DEFAULT_TURN_TO_COARSE_DEG
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
