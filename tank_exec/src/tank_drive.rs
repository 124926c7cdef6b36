//! # Tank drive
//!
//! Converts forward and rotate commands into left and right side commands
//! for a differential drive. No saturation is applied here, the motor groups
//! limit their own commands.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;

use crate::devices::{lock, MotorGroup, OperatorInput, Shared};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Scale applied to a cubed joystick axis so that full deflection still maps
/// to 100 percent.
const CURVE_SCALE: f64 = 0.01 * 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Left and right motor groups driven as a differential pair.
pub struct TankDrive {
    left: Shared<dyn MotorGroup>,
    right: Shared<dyn MotorGroup>,

    /// If true commands are velocity percentages, otherwise effort
    /// percentages.
    speed_mode: bool,

    forward_cmd: f64,
    rotate_cmd: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TankDrive {

    /// Create a new drive commanding effort percentages.
    pub fn new(left: Shared<dyn MotorGroup>, right: Shared<dyn MotorGroup>) -> Self {
        Self {
            left,
            right,
            speed_mode: false,
            forward_cmd: 0.0,
            rotate_cmd: 0.0,
        }
    }

    pub fn with_speed_mode(mut self, speed_mode: bool) -> Self {
        self.set_speed_mode(speed_mode);
        self
    }

    /// Choose between velocity (true) and effort (false) commands.
    ///
    /// Takes effect on the next command.
    pub fn set_speed_mode(&mut self, speed_mode: bool) {
        self.speed_mode = speed_mode;
    }

    pub fn speed_mode(&self) -> bool {
        self.speed_mode
    }

    /// Drive forward at `forward` percent while rotating clockwise at
    /// `rotate` percent.
    pub fn arcade(&mut self, forward: f64, rotate: f64) {
        self.forward_cmd = forward;
        self.rotate_cmd = rotate;

        let left = self.left_cmd();
        let right = self.right_cmd();

        trace!("arcade({:.2}, {:.2}) -> left {:.2}, right {:.2}", forward, rotate, left, right);

        command(&self.left, left, self.speed_mode);
        command(&self.right, right, self.speed_mode);
    }

    /// Drive the sides independently.
    ///
    /// The inputs are mapped onto arcade as `forward = left + right` and
    /// `rotate = left - right`, so each side receives twice its input.
    pub fn tank(&mut self, left: f64, right: f64) {
        self.arcade(left + right, left - right);
    }

    pub fn stop(&mut self) {
        self.arcade(0.0, 0.0);
    }

    /// Arcade control from a joystick, forward axis drives and turn axis
    /// rotates.
    pub fn left_split_arcade(&mut self, input: &dyn OperatorInput) {
        self.arcade(input.forward_axis(), input.turn_axis());
    }

    /// As `left_split_arcade` but with each axis cubed, giving finer control
    /// near the centre of the stick.
    pub fn left_split_arcade_curved(&mut self, input: &dyn OperatorInput) {
        self.arcade(curve(input.forward_axis()), curve(input.turn_axis()));
    }

    /// Last commanded forward percentage.
    pub fn forward_cmd(&self) -> f64 {
        self.forward_cmd
    }

    /// Last commanded rotation percentage.
    pub fn rotate_cmd(&self) -> f64 {
        self.rotate_cmd
    }

    /// Last left side command, before any saturation by the motors.
    pub fn left_cmd(&self) -> f64 {
        self.forward_cmd + self.rotate_cmd
    }

    /// Last right side command, before any saturation by the motors.
    pub fn right_cmd(&self) -> f64 {
        self.forward_cmd - self.rotate_cmd
    }

    /// Left encoder angle in degrees.
    pub fn left_position(&self) -> f64 {
        lock(&self.left).angle()
    }

    /// Right encoder angle in degrees.
    pub fn right_position(&self) -> f64 {
        lock(&self.right).angle()
    }

    /// Mean of the two encoder angles in degrees.
    pub fn average_position(&self) -> f64 {
        (self.left_position() + self.right_position()) / 2.0
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn command(group: &Shared<dyn MotorGroup>, pct: f64, speed_mode: bool) {
    let mut g = lock(group);

    if speed_mode {
        g.set_velocity(pct);
    }
    else {
        g.set_effort(pct);
    }
}

fn curve(axis: f64) -> f64 {
    axis * axis * axis * CURVE_SCALE
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{CommandMode, SimJoystick, SimParams, SimRobot};

    fn drive(robot: &SimRobot) -> TankDrive {
        TankDrive::new(robot.left_motors(), robot.right_motors())
    }

    #[test]
    fn test_arcade() {
        let robot = SimRobot::manual(SimParams::default());
        let mut d = drive(&robot);

        d.arcade(50.0, 10.0);
        assert_eq!(d.left_cmd(), 60.0);
        assert_eq!(d.right_cmd(), 40.0);
        assert_eq!(robot.left_cmd(), 60.0);
        assert_eq!(robot.right_cmd(), 40.0);

        d.stop();
        assert_eq!(robot.left_cmd(), 0.0);
        assert_eq!(robot.right_cmd(), 0.0);
    }

    #[test]
    fn test_tank_doubles() {
        let robot = SimRobot::manual(SimParams::default());
        let mut d = drive(&robot);

        d.tank(30.0, 30.0);
        assert_eq!(d.forward_cmd(), 60.0);
        assert_eq!(d.rotate_cmd(), 0.0);
        assert_eq!(robot.left_cmd(), 60.0);
        assert_eq!(robot.right_cmd(), 60.0);

        d.tank(20.0, -10.0);
        assert_eq!(robot.left_cmd(), 40.0);
        assert_eq!(robot.right_cmd(), -20.0);
    }

    #[test]
    fn test_no_clamping() {
        let robot = SimRobot::manual(SimParams::default());
        let mut d = drive(&robot);

        d.arcade(90.0, 30.0);

        // The drive reports what it asked for, the motors saturate
        assert_eq!(d.left_cmd(), 120.0);
        assert_eq!(robot.left_cmd(), 100.0);
        assert_eq!(robot.right_cmd(), 60.0);
    }

    #[test]
    fn test_speed_mode() {
        let robot = SimRobot::manual(SimParams::default());
        let mut d = drive(&robot);

        d.arcade(10.0, 0.0);
        assert_eq!(robot.command_mode(), CommandMode::Effort);

        d.set_speed_mode(true);
        d.arcade(10.0, 0.0);
        assert!(d.speed_mode());
        assert_eq!(robot.command_mode(), CommandMode::Velocity);
    }

    #[test]
    fn test_operator_control() {
        let robot = SimRobot::manual(SimParams::default());
        let mut d = drive(&robot);

        let stick = SimJoystick { forward: 50.0, turn: -20.0 };
        d.left_split_arcade(&stick);
        assert_eq!(d.left_cmd(), 30.0);
        assert_eq!(d.right_cmd(), 70.0);

        // 50^3 * 1e-4 = 12.5, (-20)^3 * 1e-4 = -0.8
        d.left_split_arcade_curved(&stick);
        assert!((d.forward_cmd() - 12.5).abs() < 1e-9);
        assert!((d.rotate_cmd() + 0.8).abs() < 1e-9);

        let full = SimJoystick { forward: 100.0, turn: 0.0 };
        d.left_split_arcade_curved(&full);
        assert!((d.forward_cmd() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_positions() {
        let robot = SimRobot::manual(SimParams::default());
        let mut d = drive(&robot);

        d.tank(25.0, 0.0);
        robot.advance(1.0);

        assert!(d.left_position() > 0.0);
        assert_eq!(d.right_position(), 0.0);
        assert!((d.average_position() - d.left_position() / 2.0).abs() < 1e-9);
    }
}
