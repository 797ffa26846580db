// Wheel-level motion control for the mecanum base
//
// Provides:
// - Scalar filters and the wheel speed PID
// - Wheel channels and the 4-channel manager
// - Mecanum forward/inverse kinematics
// - Duty/tick registers and a simulated drivetrain behind them

mod bank;
pub mod channel;
pub mod filter;
pub mod kinematics;
pub mod manager;
pub mod pid;
pub mod sim;

pub use bank::{BankActuator, BankEncoder, WheelBank};
pub use channel::{Actuator, Encoder, MAX_DUTY, WheelChannel};
pub use filter::{Filter, FilterConfig};
pub use kinematics::{
    BodyVelocity, Kinematics, MecanumKinematics4W, WHEEL_COUNT, WHEEL_RADIUS, WheelVelocities,
};
pub use manager::MotorControllerManager;
pub use pid::{PidController, PidGains};
pub use sim::{SimConfig, SimulatedDrivetrain};
