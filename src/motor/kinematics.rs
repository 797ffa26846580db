// Mecanum kinematics for the 4-wheel base
// Converts between body-frame velocity (vx, vy, omega) and wheel angular velocities.
//
// Frame: x forward, y left, omega counter-clockwise. A wheel speed is positive
// when that wheel alone would push the robot forward. Wheel order is fixed:
// front-left, front-right, back-left, back-right.

use serde::{Deserialize, Serialize};

/// Default geometry for the base
pub const WHEEL_RADIUS: f64 = 0.04; // meters
pub const WHEEL_BASE: f64 = 0.2; // meters, front axle to back axle
pub const TRACK_WIDTH: f64 = 0.25; // meters, left wheel to right wheel

/// Number of driven wheels
pub const WHEEL_COUNT: usize = 4;

/// Body-frame velocity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyVelocity {
    pub vx: f64,    // m/s, positive = forward
    pub vy: f64,    // m/s, positive = left
    pub omega: f64, // rad/s, positive = counter-clockwise
}

impl BodyVelocity {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Wheel angular velocities in rad/s
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelVelocities {
    pub front_left: f64,
    pub front_right: f64,
    pub back_left: f64,
    pub back_right: f64,
}

impl WheelVelocities {
    pub fn new(front_left: f64, front_right: f64, back_left: f64, back_right: f64) -> Self {
        Self {
            front_left,
            front_right,
            back_left,
            back_right,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns velocities as array [front_left, front_right, back_left, back_right]
    pub fn as_array(&self) -> [f64; WHEEL_COUNT] {
        [
            self.front_left,
            self.front_right,
            self.back_left,
            self.back_right,
        ]
    }

    pub fn from_array(w: [f64; WHEEL_COUNT]) -> Self {
        Self::new(w[0], w[1], w[2], w[3])
    }
}

/// Geometry of a 4-wheel mecanum base with rollers in the X configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MecanumKinematics4W {
    wheel_radius: f64,
    wheel_base: f64,
    track_width: f64,
}

impl MecanumKinematics4W {
    pub fn new(wheel_radius: f64, wheel_base: f64, track_width: f64) -> Self {
        Self {
            wheel_radius,
            wheel_base,
            track_width,
        }
    }

    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    pub fn wheel_base(&self) -> f64 {
        self.wheel_base
    }

    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    /// Sum of the half wheel base and half track width
    fn lever(&self) -> f64 {
        (self.wheel_base + self.track_width) / 2.0
    }

    pub fn forward(&self, wheels: &WheelVelocities) -> BodyVelocity {
        let [w0, w1, w2, w3] = wheels.as_array();
        let r = self.wheel_radius;

        BodyVelocity {
            vx: r / 4.0 * (w0 + w1 + w2 + w3),
            vy: r / 4.0 * (-w0 + w1 + w2 - w3),
            omega: r / (4.0 * self.lever()) * (-w0 + w1 - w2 + w3),
        }
    }

    pub fn inverse(&self, body: &BodyVelocity) -> WheelVelocities {
        let r = self.wheel_radius;
        let k = self.lever() * body.omega;

        WheelVelocities {
            front_left: (body.vx - body.vy - k) / r,
            front_right: (body.vx + body.vy + k) / r,
            back_left: (body.vx + body.vy - k) / r,
            back_right: (body.vx - body.vy + k) / r,
        }
    }
}

impl Default for MecanumKinematics4W {
    fn default() -> Self {
        Self::new(WHEEL_RADIUS, WHEEL_BASE, TRACK_WIDTH)
    }
}

/// Drivetrain topology selected in the robot config
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topology", rename_all = "snake_case")]
pub enum Kinematics {
    #[serde(rename = "mecanum_4w")]
    Mecanum4W(MecanumKinematics4W),
}

impl Kinematics {
    /// Wheel velocities -> body velocity
    pub fn forward(&self, wheels: &WheelVelocities) -> BodyVelocity {
        match self {
            Kinematics::Mecanum4W(k) => k.forward(wheels),
        }
    }

    /// Body velocity -> wheel velocities
    pub fn inverse(&self, body: &BodyVelocity) -> WheelVelocities {
        match self {
            Kinematics::Mecanum4W(k) => k.inverse(body),
        }
    }
}

impl Default for Kinematics {
    fn default() -> Self {
        Kinematics::Mecanum4W(MecanumKinematics4W::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_body_eq(a: BodyVelocity, b: BodyVelocity) {
        assert!((a.vx - b.vx).abs() < EPS, "vx {} != {}", a.vx, b.vx);
        assert!((a.vy - b.vy).abs() < EPS, "vy {} != {}", a.vy, b.vy);
        assert!(
            (a.omega - b.omega).abs() < EPS,
            "omega {} != {}",
            a.omega,
            b.omega
        );
    }

    #[test]
    fn test_zero_velocity() {
        let wheels = Kinematics::default().inverse(&BodyVelocity::zero());
        assert_eq!(wheels, WheelVelocities::zero());
    }

    #[test]
    fn test_forward_motion() {
        // All wheels spin forward at v / r
        let wheels = Kinematics::default().inverse(&BodyVelocity::new(0.4, 0.0, 0.0));
        for w in wheels.as_array() {
            assert!((w - 0.4 / WHEEL_RADIUS).abs() < EPS);
        }
    }

    #[test]
    fn test_strafe_left() {
        // Front-right and back-left forward, the other diagonal backward
        let wheels = Kinematics::default().inverse(&BodyVelocity::new(0.0, 0.2, 0.0));
        assert!(wheels.front_left < 0.0);
        assert!(wheels.front_right > 0.0);
        assert!(wheels.back_left > 0.0);
        assert!(wheels.back_right < 0.0);
        assert!((wheels.front_right - wheels.back_left).abs() < EPS);
    }

    #[test]
    fn test_rotation_only() {
        // Counter-clockwise: left side backward, right side forward
        let wheels = Kinematics::default().inverse(&BodyVelocity::new(0.0, 0.0, 1.0));
        assert!(wheels.front_left < 0.0 && wheels.back_left < 0.0);
        assert!(wheels.front_right > 0.0 && wheels.back_right > 0.0);
        let expected = (WHEEL_BASE + TRACK_WIDTH) / 2.0 / WHEEL_RADIUS;
        assert!((wheels.front_right - expected).abs() < EPS);
    }

    #[test]
    fn test_round_trip() {
        let kinematics = Kinematics::Mecanum4W(MecanumKinematics4W::new(0.05, 0.3, 0.21));
        let samples = [
            BodyVelocity::new(0.0, 0.0, 0.0),
            BodyVelocity::new(0.6, 0.0, 0.0),
            BodyVelocity::new(-0.3, 0.45, 0.0),
            BodyVelocity::new(0.1, -0.2, 1.7),
            BodyVelocity::new(-1.0, 1.0, -3.1),
        ];
        for v in samples {
            let wheels = kinematics.inverse(&v);
            assert_body_eq(kinematics.forward(&wheels), v);
        }
    }

    #[test]
    fn test_forward_known_values() {
        let k = MecanumKinematics4W::new(0.1, 0.4, 0.6);
        // omega = r / (4 * 0.5) * 4
        let body = k.forward(&WheelVelocities::new(-1.0, 1.0, -1.0, 1.0));
        assert_body_eq(body, BodyVelocity::new(0.0, 0.0, 0.2));
    }

    #[test]
    fn test_array_order() {
        let w = WheelVelocities::from_array([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(w.front_left, 1.0);
        assert_eq!(w.back_right, 4.0);
        assert_eq!(w.as_array(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_kinematics_config_json() {
        let k: Kinematics = serde_json::from_str(
            r#"{"topology":"mecanum_4w","wheel_radius":0.05,"wheel_base":0.3,"track_width":0.2}"#,
        )
        .unwrap();
        assert_eq!(k, Kinematics::Mecanum4W(MecanumKinematics4W::new(0.05, 0.3, 0.2)));
    }
}
