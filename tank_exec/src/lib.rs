//! # Tank drive library.
//!
//! Motion control for a differential drive (tank) robot: PID control, pose
//! estimation from the drive encoders and an inertial sensor, and blocking
//! drive and turn primitives. Hardware is consumed through the traits in
//! `devices`, with a kinematic simulation provided in `sim`.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Device capabilities - motor, encoder, heading sensor and joystick traits
pub mod devices;

/// Odometry - estimates the robot's position and heading on a background thread
pub mod odometry;

/// Parameters - drive geometry, timing and controller gains
pub mod params;

/// PID controller with integral zone and settle/timeout completion
pub mod pid;

/// Simulation - kinematic robot implementing every device trait
pub mod sim;

/// Smart drive - open and closed loop drive and turn primitives
pub mod smart_drive;

/// Tank drive - converts forward/rotate commands into side commands
pub mod tank_drive;

/// Horizontal tracker - lateral tracking wheel
pub mod tracker;

/// Planar vector
pub mod vec2;
