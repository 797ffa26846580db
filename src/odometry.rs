// Dead-reckoning pose and wheel joint positions

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::motor::{BodyVelocity, WHEEL_COUNT, WheelVelocities};

/// Pose in the odometry frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64, // radians, in (-pi, pi]
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Heading as the z and w components of a yaw-only quaternion
    pub fn quaternion_zw(&self) -> (f64, f64) {
        ((self.theta / 2.0).sin(), (self.theta / 2.0).cos())
    }
}

/// Wrap an angle into (-pi, pi]
pub fn normalize_angle(theta: f64) -> f64 {
    let wrapped = theta.sin().atan2(theta.cos());
    // atan2 may return -pi for an angle of exactly pi
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

/// Euler step of a body-frame twist into the odometry frame
pub fn integrate(pose: Pose, velocity: BodyVelocity, dt: f64) -> Pose {
    let (sin, cos) = pose.theta.sin_cos();
    Pose {
        x: pose.x + velocity.vx * cos * dt - velocity.vy * sin * dt,
        y: pose.y + velocity.vx * sin * dt + velocity.vy * cos * dt,
        theta: normalize_angle(pose.theta + velocity.omega * dt),
    }
}

/// Running pose with clamped time steps
#[derive(Debug, Clone)]
pub struct Odometry {
    pose: Pose,
    max_dt: f64,
}

impl Odometry {
    /// Steps longer than `max_dt` seconds are integrated as `max_dt`
    pub fn new(max_dt: f64) -> Self {
        Self {
            pose: Pose::default(),
            max_dt,
        }
    }

    pub fn update(&mut self, velocity: BodyVelocity, dt: f64) -> Pose {
        let dt = dt.clamp(0.0, self.max_dt);
        self.pose = integrate(self.pose, velocity, dt);
        self.pose
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn reset(&mut self, pose: Pose) {
        self.pose = pose;
    }
}

/// Accumulated wheel angles for joint-state telemetry
#[derive(Debug, Clone, Default)]
pub struct JointPositions {
    position: [f64; WHEEL_COUNT],
    velocity: [f64; WHEEL_COUNT],
}

impl JointPositions {
    pub fn update(&mut self, wheels: &WheelVelocities, dt: f64) {
        self.velocity = wheels.as_array();
        for (p, v) in self.position.iter_mut().zip(self.velocity) {
            *p += v * dt.max(0.0);
        }
    }

    pub fn position(&self) -> [f64; WHEEL_COUNT] {
        self.position
    }

    pub fn velocity(&self) -> [f64; WHEEL_COUNT] {
        self.velocity
    }
}
