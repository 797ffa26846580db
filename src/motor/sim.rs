// Simulated drivetrain
//
// Four DC wheel plants with a first-order speed response and a static
// friction deadband. Each step reads the duties from the wheel bank and
// writes back the accumulated encoder ticks.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use super::bank::WheelBank;
use super::kinematics::WHEEL_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Wheel speed at full duty (rad/s)
    pub max_wheel_speed: f64,
    /// Speed response time constant (s)
    pub time_constant: f64,
    /// Duty magnitude below which the wheel does not move
    pub static_friction: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_wheel_speed: 20.0,
            time_constant: 0.3,
            static_friction: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct WheelPlant {
    speed: f64, // rad/s
    angle: f64, // rad, unwrapped
}

pub struct SimulatedDrivetrain {
    config: SimConfig,
    resolution: f64,
    plants: [WheelPlant; WHEEL_COUNT],
}

impl SimulatedDrivetrain {
    pub fn new(config: SimConfig, resolution: f64) -> Self {
        Self {
            config,
            resolution,
            plants: Default::default(),
        }
    }

    /// Advance every wheel by `dt` seconds under the current duties
    pub fn step(&mut self, bank: &WheelBank, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let duties = bank.duties();
        let alpha = (dt / self.config.time_constant).min(1.0);
        let mut ticks = [0i64; WHEEL_COUNT];

        for (i, plant) in self.plants.iter_mut().enumerate() {
            let duty = duties[i].clamp(-1.0, 1.0);
            let steady = if duty.abs() < self.config.static_friction {
                0.0
            } else {
                duty * self.config.max_wheel_speed
            };
            plant.speed += alpha * (steady - plant.speed);
            plant.angle += plant.speed * dt;
            ticks[i] = (plant.angle / TAU * self.resolution).round() as i64;
        }

        bank.set_ticks(ticks);
    }

    /// True wheel speeds (rad/s), for inspection
    pub fn wheel_speeds(&self) -> [f64; WHEEL_COUNT] {
        let mut speeds = [0.0; WHEEL_COUNT];
        for (s, plant) in speeds.iter_mut().zip(&self.plants) {
            *s = plant.speed;
        }
        speeds
    }
}
