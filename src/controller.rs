// Per-cycle drivetrain controllers
//
// Both controllers own the wheel manager and the kinematics; which one runs is
// chosen once from the robot config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::motor::{
    Actuator, BodyVelocity, Encoder, Kinematics, MotorControllerManager, WheelVelocities,
};

/// Tracks a body-frame velocity command
pub struct VelocityController<A, E> {
    manager: MotorControllerManager<A, E>,
    kinematics: Kinematics,
    latest_command: BodyVelocity,
    set_wheel_velocities: WheelVelocities,
    robot_velocity: BodyVelocity,
}

impl<A: Actuator, E: Encoder> VelocityController<A, E> {
    pub fn new(manager: MotorControllerManager<A, E>, kinematics: Kinematics) -> Self {
        Self {
            manager,
            kinematics,
            latest_command: BodyVelocity::zero(),
            set_wheel_velocities: WheelVelocities::zero(),
            robot_velocity: BodyVelocity::zero(),
        }
    }

    /// One control cycle: command -> wheels -> measured -> body velocity
    pub fn update(&mut self, now: Duration) {
        self.set_wheel_velocities = self.kinematics.inverse(&self.latest_command);
        let measured = self.manager.set_targets(&self.set_wheel_velocities, now);
        self.robot_velocity = self.kinematics.forward(&measured);
    }

    /// Replace the command used from the next cycle on
    pub fn set_latest_command(&mut self, command: BodyVelocity) {
        self.latest_command = command;
    }

    pub fn latest_command(&self) -> BodyVelocity {
        self.latest_command
    }

    /// Estimated body velocity from the last cycle
    pub fn robot_velocity(&self) -> BodyVelocity {
        self.robot_velocity
    }

    /// Wheel velocities commanded on the last cycle
    pub fn set_wheel_velocities(&self) -> WheelVelocities {
        self.set_wheel_velocities
    }

    pub fn manager(&self) -> &MotorControllerManager<A, E> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut MotorControllerManager<A, E> {
        &mut self.manager
    }
}

/// Tracks per-wheel velocity commands directly
pub struct JointStateController<A, E> {
    manager: MotorControllerManager<A, E>,
    kinematics: Kinematics,
    latest_command: WheelVelocities,
    robot_velocity: BodyVelocity,
}

impl<A: Actuator, E: Encoder> JointStateController<A, E> {
    pub fn new(manager: MotorControllerManager<A, E>, kinematics: Kinematics) -> Self {
        Self {
            manager,
            kinematics,
            latest_command: WheelVelocities::zero(),
            robot_velocity: BodyVelocity::zero(),
        }
    }

    pub fn update(&mut self, now: Duration) {
        let measured = self.manager.set_targets(&self.latest_command, now);
        self.robot_velocity = self.kinematics.forward(&measured);
    }

    pub fn set_latest_command(&mut self, command: WheelVelocities) {
        self.latest_command = command;
    }

    pub fn robot_velocity(&self) -> BodyVelocity {
        self.robot_velocity
    }

    pub fn set_wheel_velocities(&self) -> WheelVelocities {
        self.latest_command
    }

    pub fn manager(&self) -> &MotorControllerManager<A, E> {
        &self.manager
    }
}

/// Which controller drives the wheels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    #[default]
    Velocity,
    JointState,
}

/// The active controller
pub enum DriveController<A, E> {
    Velocity(VelocityController<A, E>),
    JointState(JointStateController<A, E>),
}

impl<A: Actuator, E: Encoder> DriveController<A, E> {
    pub fn new(
        mode: ControlMode,
        manager: MotorControllerManager<A, E>,
        kinematics: Kinematics,
    ) -> Self {
        match mode {
            ControlMode::Velocity => {
                DriveController::Velocity(VelocityController::new(manager, kinematics))
            }
            ControlMode::JointState => {
                DriveController::JointState(JointStateController::new(manager, kinematics))
            }
        }
    }

    pub fn mode(&self) -> ControlMode {
        match self {
            DriveController::Velocity(_) => ControlMode::Velocity,
            DriveController::JointState(_) => ControlMode::JointState,
        }
    }

    pub fn update(&mut self, now: Duration) {
        match self {
            DriveController::Velocity(c) => c.update(now),
            DriveController::JointState(c) => c.update(now),
        }
    }

    pub fn robot_velocity(&self) -> BodyVelocity {
        match self {
            DriveController::Velocity(c) => c.robot_velocity(),
            DriveController::JointState(c) => c.robot_velocity(),
        }
    }

    pub fn set_wheel_velocities(&self) -> WheelVelocities {
        match self {
            DriveController::Velocity(c) => c.set_wheel_velocities(),
            DriveController::JointState(c) => c.set_wheel_velocities(),
        }
    }

    pub fn manager(&self) -> &MotorControllerManager<A, E> {
        match self {
            DriveController::Velocity(c) => c.manager(),
            DriveController::JointState(c) => c.manager(),
        }
    }

    /// Command every wheel to stop
    pub fn stop(&mut self) {
        match self {
            DriveController::Velocity(c) => c.set_latest_command(BodyVelocity::zero()),
            DriveController::JointState(c) => c.set_latest_command(WheelVelocities::zero()),
        }
    }
}
