// Command ingress: per-axis smoothing and integral gain scheduling

use serde::{Deserialize, Serialize};

use crate::motor::{BodyVelocity, Filter, FilterConfig};

/// Selects the integral gain from the magnitude of the filtered command
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GainSchedule {
    pub base_ki: f64,
    pub modifier_linear: f64,
    pub modifier_rotational: f64,
    /// |vx| or |vy| above this (m/s) selects the linear modifier
    pub linear_threshold: f64,
    /// |omega| above this (rad/s) selects the rotational modifier
    pub rotational_threshold: f64,
}

impl Default for GainSchedule {
    fn default() -> Self {
        Self {
            base_ki: 0.125,
            modifier_linear: 2.0,
            modifier_rotational: 1.1,
            linear_threshold: 0.5,
            rotational_threshold: 1.0,
        }
    }
}

impl GainSchedule {
    pub fn ki_for(&self, command: &BodyVelocity) -> f64 {
        if command.vx.abs() > self.linear_threshold || command.vy.abs() > self.linear_threshold {
            self.base_ki * self.modifier_linear
        } else if command.omega.abs() > self.rotational_threshold {
            self.base_ki * self.modifier_rotational
        } else {
            self.base_ki
        }
    }
}

/// Filters for the three command axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandFilterConfig {
    pub x: FilterConfig,
    pub y: FilterConfig,
    pub rotation: FilterConfig,
}

impl Default for CommandFilterConfig {
    fn default() -> Self {
        Self {
            x: FilterConfig::MovingAverage { window: 2 },
            y: FilterConfig::MovingAverage { window: 2 },
            rotation: FilterConfig::MovingAverage { window: 4 },
        }
    }
}

/// Smoothed command plus the integral gain to apply with it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledCommand {
    pub velocity: BodyVelocity,
    pub ki: f64,
}

pub struct CommandShaper {
    x: Filter,
    y: Filter,
    rotation: Filter,
    schedule: GainSchedule,
}

impl CommandShaper {
    pub fn new(filters: CommandFilterConfig, schedule: GainSchedule) -> Self {
        Self {
            x: filters.x.into(),
            y: filters.y.into(),
            rotation: filters.rotation.into(),
            schedule,
        }
    }

    /// Filter a raw command and pick the gain for it
    pub fn shape(&mut self, raw: BodyVelocity) -> ScheduledCommand {
        let velocity = BodyVelocity {
            vx: self.x.update(raw.vx),
            vy: self.y.update(raw.vy),
            omega: self.rotation.update(raw.omega),
        };
        ScheduledCommand {
            velocity,
            ki: self.schedule.ki_for(&velocity),
        }
    }

    pub fn schedule(&self) -> &GainSchedule {
        &self.schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_threshold() {
        let s = GainSchedule::default();
        assert_eq!(s.ki_for(&BodyVelocity::new(0.6, 0.0, 0.0)), 0.125 * 2.0);
        assert_eq!(s.ki_for(&BodyVelocity::new(0.0, -0.6, 2.0)), 0.125 * 2.0);
        // Threshold is exclusive
        assert_eq!(s.ki_for(&BodyVelocity::new(0.5, 0.0, 0.0)), 0.125);
    }

    #[test]
    fn test_rotational_threshold() {
        let s = GainSchedule::default();
        assert_eq!(s.ki_for(&BodyVelocity::new(0.0, 0.0, 1.2)), 0.125 * 1.1);
        assert_eq!(s.ki_for(&BodyVelocity::new(0.0, 0.0, -1.2)), 0.125 * 1.1);
    }

    #[test]
    fn test_small_command_uses_base() {
        let s = GainSchedule::default();
        assert_eq!(s.ki_for(&BodyVelocity::new(0.1, 0.1, 0.1)), 0.125);
    }

    #[test]
    fn test_schedule_sees_filtered_command() {
        let mut shaper = CommandShaper::new(CommandFilterConfig::default(), GainSchedule::default());
        // First sample passes straight through the moving average
        let first = shaper.shape(BodyVelocity::new(0.8, 0.0, 0.0));
        assert_eq!(first.velocity.vx, 0.8);
        assert_eq!(first.ki, 0.25);
        // (0.8 + 0.0) / 2 = 0.4 is below the linear threshold
        let second = shaper.shape(BodyVelocity::new(0.0, 0.0, 0.0));
        assert!((second.velocity.vx - 0.4).abs() < 1e-12);
        assert_eq!(second.ki, 0.125);
    }

    #[test]
    fn test_rotation_window() {
        let mut shaper = CommandShaper::new(CommandFilterConfig::default(), GainSchedule::default());
        let mut last = shaper.shape(BodyVelocity::new(0.0, 0.0, 2.0));
        for _ in 0..3 {
            last = shaper.shape(BodyVelocity::new(0.0, 0.0, 0.0));
        }
        // Window of four: the 2.0 is still in it
        assert!((last.velocity.omega - 0.5).abs() < 1e-12);
        let last = shaper.shape(BodyVelocity::new(0.0, 0.0, 0.0));
        assert_eq!(last.velocity.omega, 0.0);
    }
}
