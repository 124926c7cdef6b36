//! # Device capabilities
//!
//! The control core never talks to hardware directly. Motors, encoders and
//! the inertial sensor are consumed through the traits in this module, and
//! the executable (or a test) constructs the concrete devices and injects
//! them as [`Shared`] handles.
//!
//! Angles are in degrees and commands are percentages in `[-100, 100]`.
//! Implementations saturate out of range commands, the core does not clamp.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard};
use log::warn;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// A device shared between the motion primitives and the odometry thread.
pub type Shared<T> = Arc<Mutex<T>>;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something that can be driven.
pub trait Motor: Send {
    /// Command a percentage of the maximum effort (voltage).
    fn set_effort(&mut self, pct: f64);

    /// Command a percentage of the maximum velocity.
    fn set_velocity(&mut self, pct: f64);
}

/// A rotary position sensor, typically a motor's integrated encoder.
pub trait RotarySensor: Send {
    /// Cumulative angle since the last reset, in degrees.
    fn angle(&self) -> f64;

    /// Set the current angle to zero.
    fn reset_angle(&mut self);
}

/// One side of the drive: several motors commanded together, reporting a
/// single encoder position.
pub trait MotorGroup: Motor + RotarySensor {}

impl<T: Motor + RotarySensor> MotorGroup for T {}

/// An inertial sensor providing the robot's heading.
///
/// Headings follow the compass convention: 0 is the robot's initial forward
/// direction and positive angles are clockwise.
pub trait HeadingSensor: Send {
    /// Heading wrapped into `[0, 360)`.
    fn heading(&self) -> f64;

    /// Cumulative (unwrapped) rotation.
    fn rotation(&self) -> f64;

    /// Overwrite the current heading.
    fn set_heading(&mut self, heading_deg: f64);

    /// True while the sensor is calibrating and its readings are not valid.
    fn is_calibrating(&self) -> bool;

    /// Start a calibration.
    fn calibrate(&mut self);
}

/// Operator joystick axes.
pub trait OperatorInput {
    /// Forward/backward axis, `[-100, 100]`.
    fn forward_axis(&self) -> f64;

    /// Turning axis, `[-100, 100]`, positive turns clockwise.
    fn turn_axis(&self) -> f64;
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Wrap a device into a shared handle.
pub fn shared<T>(device: T) -> Shared<T> {
    Arc::new(Mutex::new(device))
}

/// Lock a shared device or state.
///
/// Devices have no invariants that a panicking holder could break, so a
/// poisoned lock is recovered rather than propagated.
pub fn lock<T: ?Sized>(device: &Mutex<T>) -> MutexGuard<'_, T> {
    match device.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            warn!("Mutex poisoned by a panicked holder, recovering");
            poisoned.into_inner()
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    struct Encoder {
        angle: f64
    }

    impl RotarySensor for Encoder {
        fn angle(&self) -> f64 {
            self.angle
        }

        fn reset_angle(&mut self) {
            self.angle = 0.0;
        }
    }

    #[test]
    fn test_lock_recovers_poison() {
        let enc = shared(Encoder { angle: 12.0 });

        let enc_clone = enc.clone();
        let res = std::thread::spawn(move || {
            let _g = enc_clone.lock().unwrap();
            panic!("poison the lock");
        }).join();
        assert!(res.is_err());
        assert!(enc.is_poisoned());

        let mut g = lock(&enc);
        assert_eq!(g.angle(), 12.0);
        g.reset_angle();
        assert_eq!(g.angle(), 0.0);
    }
}
