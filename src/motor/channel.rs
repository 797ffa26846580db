// Closed-loop speed control for a single wheel
//
// Binds an encoder, a PID, an input/output filter pair and an actuator.

use std::f64::consts::TAU;
use std::time::Duration;

use super::filter::Filter;
use super::pid::PidController;

/// Largest duty magnitude an actuator accepts
pub const MAX_DUTY: f64 = 1.0;

/// Signed duty sink (sign = direction)
pub trait Actuator {
    fn set_duty(&mut self, duty: f64);

    fn max_duty(&self) -> f64 {
        MAX_DUTY
    }
}

/// Monotonically accumulating tick counter
pub trait Encoder {
    fn ticks(&mut self) -> i64;

    /// Ticks per wheel revolution
    fn resolution(&self) -> f64;
}

pub struct WheelChannel<A, E> {
    actuator: A,
    encoder: E,
    pid: PidController,
    input_filter: Filter,
    output_filter: Filter,
    min_output: f64,
    last_sample: Option<(i64, Duration)>,
    last_duty: f64,
}

impl<A: Actuator, E: Encoder> WheelChannel<A, E> {
    pub fn new(
        actuator: A,
        encoder: E,
        pid: PidController,
        input_filter: Filter,
        output_filter: Filter,
        min_output: f64,
    ) -> Self {
        Self {
            actuator,
            encoder,
            pid,
            input_filter,
            output_filter,
            min_output: min_output.abs(),
            last_sample: None,
            last_duty: 0.0,
        }
    }

    /// Run one control step towards `target` (rad/s)
    ///
    /// Returns the filtered measured angular velocity.
    pub fn drive(&mut self, target: f64, now: Duration) -> f64 {
        let raw_velocity = self.measure(now);
        let measured = self.input_filter.update(raw_velocity);

        let raw = self.pid.compute(target, measured, now);
        let filtered = self.output_filter.update(raw);

        let duty = if target == 0.0 {
            0.0
        } else {
            apply_deadband(filtered, self.min_output, self.actuator.max_duty())
        };

        self.actuator.set_duty(duty);
        self.last_duty = duty;

        measured
    }

    /// Unfiltered wheel speed since the previous call; 0 on the first call
    fn measure(&mut self, now: Duration) -> f64 {
        let ticks = self.encoder.ticks();
        let velocity = match self.last_sample {
            Some((last_ticks, last_time)) => {
                let dt = now.saturating_sub(last_time).as_secs_f64();
                if dt > 0.0 {
                    // Counts from the bus may wrap
                    ticks.wrapping_sub(last_ticks) as f64 / self.encoder.resolution() * TAU / dt
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last_sample = Some((ticks, now));
        velocity
    }

    pub fn set_ki(&mut self, ki: f64) {
        self.pid.set_ki(ki);
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    /// Duty written to the actuator on the last `drive`
    pub fn last_duty(&self) -> f64 {
        self.last_duty
    }
}

/// Lift a non-zero command to at least `min_output` and cap it at `max_output`
pub fn apply_deadband(output: f64, min_output: f64, max_output: f64) -> f64 {
    if output == 0.0 {
        return 0.0;
    }
    let magnitude = output.abs().max(min_output).min(max_output);
    magnitude.copysign(output)
}
