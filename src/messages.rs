// Define message types for the runtime

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::{BASE_FRAME, ODOM_FRAME, WHEEL_JOINT_NAMES};
use crate::motor::{BodyVelocity, WHEEL_COUNT, WheelVelocities};
use crate::odometry::Pose;

// Command from teleop/scripts -> runtime
// m/s, m/s, rad/s
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseCommand {
    pub x_vel: f64,
    pub y_vel: f64,
    pub theta_vel: f64,
}

impl From<&BaseCommand> for BodyVelocity {
    fn from(cmd: &BaseCommand) -> Self {
        BodyVelocity::new(cmd.x_vel, cmd.y_vel, cmd.theta_vel)
    }
}

// Per-wheel command (joint-state mode), rad/s in wheel index order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelCommand {
    pub velocities: [f64; WHEEL_COUNT],
}

impl From<&WheelCommand> for WheelVelocities {
    fn from(cmd: &WheelCommand) -> Self {
        WheelVelocities::from_array(cmd.velocities)
    }
}

// Actuation output from runtime -> motor driver
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WheelDuties {
    pub duty: [f64; WHEEL_COUNT],
}

// Encoder counts from the sensor layer -> runtime
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EncoderTicks {
    pub ticks: [i64; WHEEL_COUNT],
}

/// Wall-clock timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: u64,
    pub nanosec: u32,
}

impl Stamp {
    pub fn now() -> Self {
        // A clock before the epoch is reported as zero
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: since_epoch.as_secs(),
            nanosec: since_epoch.subsec_nanos(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseMsg {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    // Yaw-only quaternion
    pub qz: f64,
    pub qw: f64,
}

impl From<Pose> for PoseMsg {
    fn from(pose: Pose) -> Self {
        let (qz, qw) = pose.quaternion_zw();
        Self {
            x: pose.x,
            y: pose.y,
            theta: pose.theta,
            qz,
            qw,
        }
    }
}

/// Row-major 6x6 covariance over (x, y, z, roll, pitch, yaw)
pub fn default_covariance() -> [f64; 36] {
    let mut covariance = [0.0; 36];
    for (axis, variance) in [0.8, 0.8, 0.8, 0.0, 0.0, 0.8].into_iter().enumerate() {
        covariance[axis * 7] = variance;
    }
    covariance
}

// Odometry published every cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdometryMsg {
    pub stamp: Stamp,
    pub frame_id: String,
    pub child_frame_id: String,
    pub pose: PoseMsg,
    pub twist: BodyVelocity,
    pub pose_covariance: Vec<f64>,
    pub twist_covariance: Vec<f64>,
}

impl OdometryMsg {
    pub fn new(stamp: Stamp, pose: Pose, twist: BodyVelocity) -> Self {
        let covariance = default_covariance().to_vec();
        Self {
            stamp,
            frame_id: ODOM_FRAME.to_string(),
            child_frame_id: BASE_FRAME.to_string(),
            pose: pose.into(),
            twist,
            pose_covariance: covariance.clone(),
            twist_covariance: covariance,
        }
    }
}

// Wheel joint states (measured or wanted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointState {
    pub stamp: Stamp,
    pub frame_id: String,
    pub name: Vec<String>,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
}

impl JointState {
    pub fn new(
        stamp: Stamp,
        position: Option<[f64; WHEEL_COUNT]>,
        velocity: [f64; WHEEL_COUNT],
    ) -> Self {
        Self {
            stamp,
            frame_id: BASE_FRAME.to_string(),
            name: WHEEL_JOINT_NAMES.iter().map(|n| n.to_string()).collect(),
            position: position.map(|p| p.to_vec()).unwrap_or_default(),
            velocity: velocity.to_vec(),
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
