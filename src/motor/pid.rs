// Discrete PID for wheel speed regulation
//
// Output is an unbounded signed control signal; the wheel channel maps it
// onto the actuator's duty range.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Controller gains, all non-negative
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    integral: f64,
    last_error: f64,
    last_time: Option<Duration>,
    max_sampling_time: Duration,
    max_integral: f64,
}

impl PidController {
    /// `max_sampling_time` caps the elapsed time used by the integral and
    /// derivative terms, `max_integral` bounds the accumulator symmetrically.
    pub fn new(gains: PidGains, max_sampling_time: Duration, max_integral: f64) -> Self {
        Self {
            gains,
            integral: 0.0,
            last_error: 0.0,
            last_time: None,
            max_sampling_time,
            max_integral: max_integral.abs(),
        }
    }

    /// Compute the control output for `now` (monotonic time since start)
    ///
    /// The first call only has a proportional term.
    pub fn compute(&mut self, setpoint: f64, measurement: f64, now: Duration) -> f64 {
        // saturating_sub turns a clock step backwards into dt = 0
        let dt = match self.last_time {
            Some(last) => now
                .saturating_sub(last)
                .min(self.max_sampling_time)
                .as_secs_f64(),
            None => 0.0,
        };

        let error = setpoint - measurement;

        self.integral =
            (self.integral + error * dt).clamp(-self.max_integral, self.max_integral);

        let derivative = if dt > 0.0 {
            (error - self.last_error) / dt
        } else {
            0.0
        };

        let output =
            self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;

        self.last_error = error;
        self.last_time = Some(now);

        output
    }

    /// Change the integral gain, keeping the accumulated integral
    pub fn set_ki(&mut self, ki: f64) {
        self.gains.ki = ki;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}
