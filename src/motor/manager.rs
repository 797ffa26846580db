// Fixed set of four wheel channels, indexed front-left, front-right,
// back-left, back-right (same order as the kinematics).

use std::time::Duration;

use super::channel::{Actuator, Encoder, WheelChannel};
use super::kinematics::{WHEEL_COUNT, WheelVelocities};

pub struct MotorControllerManager<A, E> {
    channels: [WheelChannel<A, E>; WHEEL_COUNT],
}

impl<A: Actuator, E: Encoder> MotorControllerManager<A, E> {
    pub fn new(channels: [WheelChannel<A, E>; WHEEL_COUNT]) -> Self {
        Self { channels }
    }

    /// Drive every channel towards its target, in index order
    ///
    /// Returns the measured wheel velocities in the same order.
    pub fn set_targets(&mut self, targets: &WheelVelocities, now: Duration) -> WheelVelocities {
        let targets = targets.as_array();
        let mut measured = [0.0; WHEEL_COUNT];
        for (i, channel) in self.channels.iter_mut().enumerate() {
            measured[i] = channel.drive(targets[i], now);
        }
        WheelVelocities::from_array(measured)
    }

    /// Set the integral gain on all channels
    pub fn set_ki(&mut self, ki: f64) {
        for channel in &mut self.channels {
            channel.set_ki(ki);
        }
    }

    /// Duty last written to each actuator
    pub fn duties(&self) -> [f64; WHEEL_COUNT] {
        let mut duties = [0.0; WHEEL_COUNT];
        for (i, channel) in self.channels.iter().enumerate() {
            duties[i] = channel.last_duty();
        }
        duties
    }

    pub fn channels(&self) -> &[WheelChannel<A, E>; WHEEL_COUNT] {
        &self.channels
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::motor::channel::tests::{RecordingActuator, ScriptedEncoder};
    use crate::motor::filter::Filter;
    use crate::motor::pid::{PidController, PidGains};

    pub(crate) fn manager(
        kp: f64,
        ki: f64,
    ) -> (
        MotorControllerManager<RecordingActuator, ScriptedEncoder>,
        [RecordingActuator; WHEEL_COUNT],
        [ScriptedEncoder; WHEEL_COUNT],
    ) {
        let actuators: [RecordingActuator; WHEEL_COUNT] = Default::default();
        let encoders: [ScriptedEncoder; WHEEL_COUNT] = Default::default();
        let channels = std::array::from_fn(|i| {
            WheelChannel::new(
                actuators[i].clone(),
                encoders[i].clone(),
                PidController::new(
                    PidGains::new(kp, ki, 0.0),
                    Duration::from_millis(200),
                    5.2,
                ),
                Filter::PassThrough,
                Filter::PassThrough,
                0.0,
            )
        });
        (MotorControllerManager::new(channels), actuators, encoders)
    }

    #[test]
    fn test_targets_fan_out_in_order() {
        let (mut m, actuators, _) = manager(0.1, 0.0);
        m.set_targets(
            &WheelVelocities::new(1.0, -2.0, 3.0, -4.0),
            Duration::from_millis(0),
        );
        let written: Vec<f64> = actuators.iter().map(|a| a.duties.borrow()[0]).collect();
        let expected = [0.1, -0.2, 0.3, -0.4];
        for (w, e) in written.iter().zip(expected) {
            assert!((w - e).abs() < 1e-12);
        }
        assert_eq!(m.duties().len(), WHEEL_COUNT);
    }

    #[test]
    fn test_measurements_fan_in_in_order() {
        let (mut m, _, encoders) = manager(0.0, 0.0);
        m.set_targets(&WheelVelocities::zero(), Duration::from_millis(0));
        for (i, e) in encoders.iter().enumerate() {
            e.count.set(100 * (i as i64 + 1));
        }
        let measured = m.set_targets(&WheelVelocities::zero(), Duration::from_millis(100));
        let m = measured.as_array();
        assert!(m[0] > 0.0);
        assert!((m[1] - 2.0 * m[0]).abs() < 1e-9);
        assert!((m[3] - 4.0 * m[0]).abs() < 1e-9);
    }

    #[test]
    fn test_set_ki_reaches_every_channel() {
        let (mut m, _, _) = manager(0.1, 0.125);
        m.set_ki(0.25);
        for ch in m.channels() {
            assert_eq!(ch.pid().gains().ki, 0.25);
        }
    }
}
