//! # PID controller
//!
//! General purpose closed loop controller with settle and timeout based
//! completion. A controller is normally built once from parameters and
//! [`PidController::reset`] before each motion:
//!
//! ```ignore
//! let mut pid = PidController::new()
//!     .with_constants(2.0, 0.0, -5.0)
//!     .with_integral_zone(10.0)
//!     .with_timeout(2.0)
//!     .with_settle_zone(3.0)
//!     .with_settle_timeout(0.25);
//!
//! pid.reset();
//! while !pid.is_completed() {
//!     let out = pid.calculate_target(target, feedback());
//!     // command the output
//!     std::thread::sleep(period);
//! }
//! ```
//!
//! The derivative term is `prev_error - error`, which is the negative of the
//! textbook `error - prev_error`. Damping therefore needs a negative `kd`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::time::Instant;
use serde::Serialize;

// Internal
use crate::params::PidParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    kp: f64,

    /// Integral gain
    ki: f64,

    /// Derivative gain
    kd: f64,

    /// Feed forward, added to every output
    ff: f64,

    /// Integral only accumulates while `|error|` is strictly below this
    integral_zone: f64,

    /// Error band considered settled
    settle_zone: f64,

    /// Time after reset at which the controller completes, 0 disables.
    ///
    /// Units: seconds
    timeout_s: f64,

    /// Time the error must remain settled to complete, 0 disables.
    ///
    /// Units: seconds
    settle_timeout_s: f64,

    error: f64,
    prev_error: f64,
    integral: f64,
    derivative: f64,

    /// Instant of the last reset
    #[serde(skip)]
    start_time: Instant,

    /// Last instant at which the error was outside the settle zone
    #[serde(skip)]
    settled_since: Instant,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PidController {
    fn default() -> Self {
        Self::new()
    }
}

impl PidController {

    /// Create a new controller with `kp = 1` and every other gain, zone and
    /// timeout at zero.
    ///
    /// With both timeouts at zero the controller never completes, configure at
    /// least one before using it to drive a motion.
    pub fn new() -> Self {
        let now = Instant::now();

        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            ff: 0.0,
            integral_zone: 0.0,
            settle_zone: 0.0,
            timeout_s: 0.0,
            settle_timeout_s: 0.0,
            error: 0.0,
            prev_error: 0.0,
            integral: 0.0,
            derivative: 0.0,
            start_time: now,
            settled_since: now,
        }
    }

    /// Create a controller from its parameters.
    pub fn from_params(params: &PidParams) -> Self {
        Self::new()
            .with_constants_ff(params.kp, params.ki, params.kd, params.ff)
            .with_integral_zone(params.integral_zone)
            .with_settle_zone(params.settle_zone)
            .with_timeout(params.timeout_s)
            .with_settle_timeout(params.settle_timeout_s)
    }

    /// Clear the running state and restart both timers.
    pub fn reset(&mut self) {
        self.error = 0.0;
        self.prev_error = 0.0;
        self.derivative = 0.0;
        self.integral = 0.0;

        let now = Instant::now();
        self.start_time = now;
        self.settled_since = now;
    }

    /// Get the output of the controller for the given error.
    pub fn calculate(&mut self, error: f64) -> f64 {
        self.error = error;
        self.derivative = self.prev_error - self.error;

        // Literal comparison: a zone of 0 means the integral is always reset.
        if self.error.abs() < self.integral_zone {
            self.integral += self.error;
        }
        else {
            self.integral = 0.0;
        }

        if self.error.abs() > self.settle_zone {
            self.settled_since = Instant::now();
        }

        let output = self.kp * self.error
            + self.kd * self.derivative
            + self.ki * self.integral
            + self.ff;

        self.prev_error = self.error;

        output
    }

    /// Get the output of the controller for a target and a feedback value.
    pub fn calculate_target(&mut self, target: f64, feedback: f64) -> f64 {
        self.calculate(target - feedback)
    }

    /// Returns true once the timeout has passed, or once the error has been
    /// within the settle zone for longer than the settle timeout.
    pub fn is_completed(&self) -> bool {
        if self.timeout_s != 0.0 && self.time_passed() > self.timeout_s {
            return true;
        }

        self.settle_timeout_s != 0.0 && self.settled_time_passed() > self.settle_timeout_s
    }

    /// True if at least one of the timeouts is enabled, i.e. the controller
    /// can complete.
    pub fn has_completion_criteria(&self) -> bool {
        self.timeout_s != 0.0 || self.settle_timeout_s != 0.0
    }

    /// Seconds since the last reset.
    pub fn time_passed(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Seconds since the error was last outside the settle zone.
    pub fn settled_time_passed(&self) -> f64 {
        self.settled_since.elapsed().as_secs_f64()
    }

    // ---- TERMS ----

    /// Proportional contribution of the last output.
    pub fn proportional(&self) -> f64 {
        self.error * self.kp
    }

    /// Integral contribution of the last output.
    pub fn integral(&self) -> f64 {
        self.integral * self.ki
    }

    /// Derivative contribution of the last output.
    pub fn derivative(&self) -> f64 {
        self.derivative * self.kd
    }

    /// The last error passed in.
    pub fn error(&self) -> f64 {
        self.error
    }

    // ---- GAINS ----

    pub fn kp(&self) -> f64 {
        self.kp
    }

    pub fn ki(&self) -> f64 {
        self.ki
    }

    pub fn kd(&self) -> f64 {
        self.kd
    }

    pub fn ff(&self) -> f64 {
        self.ff
    }

    // ---- CONFIGURATION ----

    pub fn set_constants(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    pub fn set_constants_ff(&mut self, kp: f64, ki: f64, kd: f64, ff: f64) {
        self.set_constants(kp, ki, kd);
        self.ff = ff;
    }

    pub fn set_integral_zone(&mut self, integral_zone: f64) {
        self.integral_zone = integral_zone;
    }

    /// Set the timeout in seconds, 0 disables it.
    pub fn set_timeout(&mut self, timeout_s: f64) {
        self.timeout_s = timeout_s;
    }

    pub fn set_settle_zone(&mut self, settle_zone: f64) {
        self.settle_zone = settle_zone;
    }

    /// Set the settle timeout in seconds, 0 disables it.
    pub fn set_settle_timeout(&mut self, settle_timeout_s: f64) {
        self.settle_timeout_s = settle_timeout_s;
    }

    pub fn with_constants(mut self, kp: f64, ki: f64, kd: f64) -> Self {
        self.set_constants(kp, ki, kd);
        self
    }

    pub fn with_constants_ff(mut self, kp: f64, ki: f64, kd: f64, ff: f64) -> Self {
        self.set_constants_ff(kp, ki, kd, ff);
        self
    }

    pub fn with_integral_zone(mut self, integral_zone: f64) -> Self {
        self.set_integral_zone(integral_zone);
        self
    }

    pub fn with_timeout(mut self, timeout_s: f64) -> Self {
        self.set_timeout(timeout_s);
        self
    }

    pub fn with_settle_zone(mut self, settle_zone: f64) -> Self {
        self.set_settle_zone(settle_zone);
        self
    }

    pub fn with_settle_timeout(mut self, settle_timeout_s: f64) -> Self {
        self.set_settle_timeout(settle_timeout_s);
        self
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_output_terms() {
        let mut pid = PidController::new()
            .with_constants_ff(2.0, 0.5, 3.0, 1.0)
            .with_integral_zone(100.0);
        pid.reset();

        // First call: derivative is prev (0) - error
        let out = pid.calculate(4.0);
        assert_eq!(pid.proportional(), 8.0);
        assert_eq!(pid.integral(), 2.0);
        assert_eq!(pid.derivative(), -12.0);
        assert_eq!(out, 8.0 + 2.0 - 12.0 + 1.0);

        // Constant error: derivative converges to zero
        pid.calculate(4.0);
        assert_eq!(pid.derivative(), 0.0);
        pid.calculate(4.0);
        assert_eq!(pid.derivative(), 0.0);
        assert_eq!(pid.integral(), 0.5 * 12.0);

        // Falling error gives a positive derivative term
        pid.calculate(1.0);
        assert_eq!(pid.derivative(), 9.0);
    }

    #[test]
    fn test_integral_zone() {
        let mut pid = PidController::new()
            .with_constants(0.0, 1.0, 0.0)
            .with_integral_zone(5.0);
        pid.reset();

        for n in 1..=4 {
            pid.calculate(2.0);
            assert_eq!(pid.integral(), 2.0 * n as f64);
        }

        // Leaving the zone resets the integral immediately, equal to the zone
        // counts as outside
        pid.calculate(5.0);
        assert_eq!(pid.integral(), 0.0);

        pid.calculate(-1.0);
        assert_eq!(pid.integral(), -1.0);
    }

    #[test]
    fn test_integral_zone_zero_disables() {
        let mut pid = PidController::new()
            .with_constants(0.0, 1.0, 0.0)
            .with_integral_zone(0.0);
        pid.reset();

        for _ in 0..5 {
            pid.calculate(0.5);
            assert_eq!(pid.integral(), 0.0);
        }
    }

    #[test]
    fn test_calculate_target() {
        let mut a = PidController::new().with_constants(1.5, 0.0, 0.0);
        let mut b = a.clone();

        assert_eq!(a.calculate_target(10.0, 4.0), b.calculate(6.0));
    }

    #[test]
    fn test_timeout_completion() {
        let mut pid = PidController::new()
            .with_timeout(0.1)
            .with_settle_timeout(0.0);
        pid.reset();

        pid.calculate(0.0);
        assert!(!pid.is_completed());

        sleep(Duration::from_millis(150));
        assert!(pid.is_completed());

        // Error has no influence on timeout completion
        pid.calculate(1000.0);
        assert!(pid.is_completed());

        // Reset restarts the timer
        pid.reset();
        assert!(!pid.is_completed());
    }

    #[test]
    fn test_settle_completion() {
        let mut pid = PidController::new()
            .with_settle_zone(3.0)
            .with_settle_timeout(0.1);
        pid.reset();

        pid.calculate(10.0);
        sleep(Duration::from_millis(60));
        pid.calculate(1.0);
        assert!(!pid.is_completed());

        // An out of zone sample restarts the settle timer
        sleep(Duration::from_millis(60));
        pid.calculate(10.0);
        pid.calculate(1.0);
        sleep(Duration::from_millis(60));
        pid.calculate(-2.5);
        assert!(!pid.is_completed());

        sleep(Duration::from_millis(80));
        pid.calculate(1.0);
        assert!(pid.is_completed());

        // A new large error undoes settle completion
        pid.calculate(10.0);
        assert!(!pid.is_completed());
    }

    #[test]
    fn test_no_completion_criteria() {
        let mut pid = PidController::new();
        assert!(!pid.has_completion_criteria());

        pid.reset();
        sleep(Duration::from_millis(20));
        pid.calculate(0.0);
        assert!(!pid.is_completed());

        pid.set_settle_timeout(0.25);
        assert!(pid.has_completion_criteria());
    }

    #[test]
    fn test_from_params() {
        let params = PidParams {
            kp: 1.0,
            ki: 0.1,
            kd: -2.0,
            ff: 5.0,
            integral_zone: 10.0,
            settle_zone: 3.0,
            timeout_s: 2.0,
            settle_timeout_s: 0.25,
        };
        let pid = PidController::from_params(&params);

        assert_eq!(pid.kp(), 1.0);
        assert_eq!(pid.ki(), 0.1);
        assert_eq!(pid.kd(), -2.0);
        assert_eq!(pid.ff(), 5.0);
        assert!(pid.has_completion_criteria());
    }
}
