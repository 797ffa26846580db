// Timeouts, topics, robot configuration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{CommandFilterConfig, GainSchedule};
use crate::controller::ControlMode;
use crate::motor::{FilterConfig, Kinematics, SimConfig};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_BASE: &str = "mecanum/cmd/base"; // body velocity commands
pub const TOPIC_CMD_WHEELS: &str = "mecanum/cmd/wheels"; // wheel velocity commands
pub const TOPIC_ODOM: &str = "mecanum/state/odom";
pub const TOPIC_JOINT_STATES: &str = "mecanum/state/joint_states";
pub const TOPIC_WANTED_JOINT_STATES: &str = "mecanum/state/wanted_joint_states";
pub const TOPIC_HEALTH: &str = "mecanum/state/health"; // health status
pub const TOPIC_RT_DUTY: &str = "mecanum/rt/duty"; // actuation
pub const TOPIC_RT_ENCODERS: &str = "mecanum/rt/encoders"; // encoder counts

// Frame ids stamped on odometry
pub const ODOM_FRAME: &str = "odom";
pub const BASE_FRAME: &str = "base_link";

/// Joint names in wheel index order
pub const WHEEL_JOINT_NAMES: [&str; 4] = [
    "wheel_front_left_joint",
    "wheel_front_right_joint",
    "wheel_back_left_joint",
    "wheel_back_right_joint",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Where duties go and ticks come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process wheel plants
    #[default]
    Simulated,
    /// Duties published on the bus, ticks received from it
    Bus,
}

/// Wheel speed PID settings shared by all four channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub kd: f64,
    /// Seconds; longer gaps between updates are treated as this long
    pub max_sampling_time: f64,
    pub max_integral: f64,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 0.105,
            kd: 0.005,
            max_sampling_time: 0.2,
            max_integral: 5.2,
        }
    }
}

/// Filters on each wheel channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelFilterConfig {
    pub encoder_input: FilterConfig,
    pub motor_output: FilterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub mode: ControlMode,
    pub backend: Backend,
    pub kinematics: Kinematics,
    /// Encoder ticks per wheel revolution
    pub encoder_resolution: f64,
    pub pid: PidConfig,
    /// Integral gain and its command-dependent modifiers
    pub gain_schedule: GainSchedule,
    /// Smallest non-zero duty magnitude sent to a motor
    pub min_output: f64,
    pub wheel_filters: WheelFilterConfig,
    pub command_filters: CommandFilterConfig,
    /// Longest time step (s) integrated into the pose in one cycle
    pub max_odometry_dt: f64,
    pub sim: SimConfig,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            mode: ControlMode::default(),
            backend: Backend::default(),
            kinematics: Kinematics::default(),
            encoder_resolution: 1440.0,
            pid: PidConfig::default(),
            gain_schedule: GainSchedule::default(),
            min_output: 0.35,
            wheel_filters: WheelFilterConfig::default(),
            command_filters: CommandFilterConfig::default(),
            max_odometry_dt: 0.2,
            sim: SimConfig::default(),
        }
    }
}

impl RobotConfig {
    /// Read a JSON config file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: RobotConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Kinematics::Mecanum4W(geometry) = self.kinematics;
        positive("kinematics.wheel_radius", geometry.wheel_radius())?;
        positive("kinematics.wheel_base", geometry.wheel_base())?;
        positive("kinematics.track_width", geometry.track_width())?;
        positive("encoder_resolution", self.encoder_resolution)?;

        non_negative("pid.kp", self.pid.kp)?;
        non_negative("pid.kd", self.pid.kd)?;
        positive("pid.max_sampling_time", self.pid.max_sampling_time)?;
        non_negative("pid.max_integral", self.pid.max_integral)?;

        let schedule = &self.gain_schedule;
        non_negative("gain_schedule.base_ki", schedule.base_ki)?;
        non_negative("gain_schedule.modifier_linear", schedule.modifier_linear)?;
        non_negative("gain_schedule.modifier_rotational", schedule.modifier_rotational)?;

        if !(0.0..=1.0).contains(&self.min_output) {
            return Err(ConfigError::Invalid {
                field: "min_output",
                reason: format!("{} is outside [0, 1]", self.min_output),
            });
        }
        positive("max_odometry_dt", self.max_odometry_dt)?;

        filter("wheel_filters.encoder_input", self.wheel_filters.encoder_input)?;
        filter("wheel_filters.motor_output", self.wheel_filters.motor_output)?;
        filter("command_filters.x", self.command_filters.x)?;
        filter("command_filters.y", self.command_filters.y)?;
        filter("command_filters.rotation", self.command_filters.rotation)?;

        positive("sim.max_wheel_speed", self.sim.max_wheel_speed)?;
        positive("sim.time_constant", self.sim.time_constant)?;
        Ok(())
    }

    pub fn max_sampling_time(&self) -> Duration {
        Duration::from_secs_f64(self.pid.max_sampling_time)
    }

    /// A loop period longer than the dt caps would have every cycle clamped
    pub fn check_loop_rate(&self, loop_hz: u64) -> Result<(), ConfigError> {
        let period = if loop_hz == 0 {
            f64::INFINITY
        } else {
            1.0 / loop_hz as f64
        };
        let limit = self.max_odometry_dt.min(self.pid.max_sampling_time);
        if period > limit {
            return Err(ConfigError::Invalid {
                field: "loop_hz",
                reason: format!(
                    "{} Hz gives a {:.3} s period, longer than the {} s step limit",
                    loop_hz, period, limit
                ),
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{} must be positive", value),
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{} must not be negative", value),
        })
    }
}

fn filter(field: &'static str, config: FilterConfig) -> Result<(), ConfigError> {
    match config {
        FilterConfig::PassThrough => Ok(()),
        FilterConfig::MovingAverage { window: 0 } => Err(ConfigError::Invalid {
            field,
            reason: "moving average window must be at least 1".to_string(),
        }),
        FilterConfig::MovingAverage { .. } => Ok(()),
        FilterConfig::LowPass {
            time_constant,
            sample_period,
        } => {
            positive(field, time_constant)?;
            positive(field, sample_period)
        }
    }
}
