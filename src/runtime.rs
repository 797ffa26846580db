// Fixed-rate control loop with watchdog
// Note: the watchdog stops the wheels when commands stop arriving, eg. if teleop crashes
//
// Each tick: drain pending commands (keep latest), run one control cycle,
// integrate odometry, publish telemetry. Commands are only applied between
// cycles, so the cycle never sees a half-written command.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::command::CommandShaper;
use crate::config::{
    Backend, CMD_TIMEOUT, RobotConfig, TOPIC_CMD_BASE, TOPIC_CMD_WHEELS, TOPIC_HEALTH,
    TOPIC_JOINT_STATES, TOPIC_ODOM, TOPIC_RT_DUTY, TOPIC_RT_ENCODERS, TOPIC_WANTED_JOINT_STATES,
};
use crate::controller::{ControlMode, DriveController};
use crate::messages::{
    BaseCommand, EncoderTicks, JointState, OdometryMsg, RuntimeHealth, Stamp, WheelCommand,
    WheelDuties,
};
use crate::motor::{
    BankActuator, BankEncoder, BodyVelocity, Kinematics, MotorControllerManager,
    PidController, PidGains, SimulatedDrivetrain, WHEEL_COUNT, WheelBank, WheelChannel,
    WheelVelocities,
};
use crate::odometry::{JointPositions, Odometry, Pose};

/// Everything one control cycle produced
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub robot_velocity: BodyVelocity,
    pub pose: Pose,
    pub joint_position: [f64; WHEEL_COUNT],
    pub joint_velocity: [f64; WHEEL_COUNT],
    pub wanted_wheel_velocities: WheelVelocities,
    pub duties: [f64; WHEEL_COUNT],
    pub health: RuntimeHealth,
}

/// Control context owned by the run loop
pub struct Runtime {
    controller: DriveController<BankActuator, BankEncoder>,
    shaper: CommandShaper,
    kinematics: Kinematics,
    odometry: Odometry,
    joints: JointPositions,
    bank: WheelBank,
    sim: Option<SimulatedDrivetrain>,
    max_step: f64,
    cmd_received_at: Option<Duration>,
    last_cycle: Option<Duration>,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new(config: &RobotConfig) -> Self {
        let bank = WheelBank::new();
        let gains = PidGains::new(config.pid.kp, config.gain_schedule.base_ki, config.pid.kd);

        let channels = std::array::from_fn(|i| {
            WheelChannel::new(
                bank.actuator(i),
                bank.encoder(i, config.encoder_resolution),
                PidController::new(gains, config.max_sampling_time(), config.pid.max_integral),
                config.wheel_filters.encoder_input.into(),
                config.wheel_filters.motor_output.into(),
                config.min_output,
            )
        });
        let manager = MotorControllerManager::new(channels);

        let sim = match config.backend {
            Backend::Simulated => Some(SimulatedDrivetrain::new(
                config.sim,
                config.encoder_resolution,
            )),
            Backend::Bus => None,
        };

        Self {
            controller: DriveController::new(config.mode, manager, config.kinematics),
            shaper: CommandShaper::new(config.command_filters, config.gain_schedule),
            kinematics: config.kinematics,
            odometry: Odometry::new(config.max_odometry_dt),
            joints: JointPositions::default(),
            bank,
            sim,
            max_step: config.max_odometry_dt,
            cmd_received_at: None,
            last_cycle: None,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.controller.mode()
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Filter a body velocity command, reschedule ki and latch it
    pub fn on_base_command(&mut self, cmd: &BaseCommand, now: Duration) {
        let mode = self.controller.mode();
        let DriveController::Velocity(controller) = &mut self.controller else {
            warn!("Ignoring body velocity command in {:?} mode", mode);
            return;
        };
        let shaped = self.shaper.shape(BodyVelocity::from(cmd));
        debug!(
            "Command {:?} -> {:?}, ki={}",
            cmd, shaped.velocity, shaped.ki
        );
        controller.manager_mut().set_ki(shaped.ki);
        controller.set_latest_command(shaped.velocity);
        self.cmd_received_at = Some(now);
    }

    /// Latch a per-wheel velocity command
    pub fn on_wheel_command(&mut self, cmd: &WheelCommand, now: Duration) {
        let mode = self.controller.mode();
        let DriveController::JointState(controller) = &mut self.controller else {
            warn!("Ignoring wheel command in {:?} mode", mode);
            return;
        };
        debug!("Wheel command {:?}", cmd.velocities);
        controller.set_latest_command(WheelVelocities::from(cmd));
        self.cmd_received_at = Some(now);
    }

    /// Parse a command payload for the active mode
    pub fn on_command_payload(
        &mut self,
        payload: &[u8],
        now: Duration,
    ) -> Result<(), serde_json::Error> {
        match self.controller.mode() {
            ControlMode::Velocity => {
                let cmd: BaseCommand = serde_json::from_slice(payload)?;
                self.on_base_command(&cmd, now);
            }
            ControlMode::JointState => {
                let cmd: WheelCommand = serde_json::from_slice(payload)?;
                self.on_wheel_command(&cmd, now);
            }
        }
        Ok(())
    }

    /// Latest encoder counts from the sensor layer
    pub fn on_encoders(&mut self, encoders: &EncoderTicks) {
        self.bank.set_ticks(encoders.ticks);
    }

    /// Stop the wheels if the last command is older than the timeout
    fn check_watchdog(&mut self, now: Duration) {
        let fresh = self
            .cmd_received_at
            .is_some_and(|at| now.saturating_sub(at) <= CMD_TIMEOUT);

        if fresh {
            if self.health != RuntimeHealth::Ok {
                info!("Commands resumed");
            }
            self.health = RuntimeHealth::Ok;
        } else {
            // Watchdog triggered - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale (timeout {:?}), stopping robot", CMD_TIMEOUT);
            }
            self.health = RuntimeHealth::CmdStale;
            // Feed the stop through the command filters so a later command is
            // not averaged with samples from before the timeout
            if let DriveController::Velocity(controller) = &mut self.controller {
                let shaped = self.shaper.shape(BodyVelocity::zero());
                controller.manager_mut().set_ki(shaped.ki);
            }
            self.controller.stop();
        }
    }

    /// Run one control cycle at `now` (time since start)
    pub fn step(&mut self, now: Duration) -> CycleReport {
        let dt = self
            .last_cycle
            .map_or(0.0, |last| now.saturating_sub(last).as_secs_f64());
        self.last_cycle = Some(now);

        self.check_watchdog(now);

        if let Some(sim) = &mut self.sim {
            sim.step(&self.bank, dt);
        }

        self.controller.update(now);
        let robot_velocity = self.controller.robot_velocity();
        let pose = self.odometry.update(robot_velocity, dt);

        let wheels = self.kinematics.inverse(&robot_velocity);
        self.joints.update(&wheels, dt.min(self.max_step));

        debug!(
            "dt={:.4} v=({:.3}, {:.3}, {:.3}) pose=({:.3}, {:.3}, {:.3})",
            dt,
            robot_velocity.vx,
            robot_velocity.vy,
            robot_velocity.omega,
            pose.x,
            pose.y,
            pose.theta
        );

        CycleReport {
            robot_velocity,
            pose,
            joint_position: self.joints.position(),
            joint_velocity: self.joints.velocity(),
            wanted_wheel_velocities: self.controller.set_wheel_velocities(),
            duties: self.controller.manager().duties(),
            health: self.health,
        }
    }
}

pub async fn run(
    config: RobotConfig,
    loop_hz: u64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config.check_loop_rate(loop_hz)?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    let cmd_topic = match config.mode {
        ControlMode::Velocity => TOPIC_CMD_BASE,
        ControlMode::JointState => TOPIC_CMD_WHEELS,
    };

    info!("Setting up publishers and subscribers...");
    let sub_cmd = session.declare_subscriber(cmd_topic).await?;
    let sub_encoders = match config.backend {
        Backend::Bus => Some(session.declare_subscriber(TOPIC_RT_ENCODERS).await?),
        Backend::Simulated => None,
    };
    let pub_duty = session.declare_publisher(TOPIC_RT_DUTY).await?;
    let pub_odom = session.declare_publisher(TOPIC_ODOM).await?;
    let pub_joints = session.declare_publisher(TOPIC_JOINT_STATES).await?;
    let pub_wanted = session.declare_publisher(TOPIC_WANTED_JOINT_STATES).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new(&config);
    let started = Instant::now();
    let mut tick = interval(Duration::from_secs_f64(1.0 / loop_hz as f64));
    // One listener for the whole run, so a SIGINT during publishing is not lost
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, {:?} mode, {:?} backend",
        loop_hz,
        CMD_TIMEOUT.as_millis(),
        config.mode,
        config.backend
    );
    info!("Subscribed to: {}", cmd_topic);
    info!(
        "Publishing to: {}, {}, {}, {}",
        TOPIC_ODOM, TOPIC_JOINT_STATES, TOPIC_WANTED_JOINT_STATES, TOPIC_HEALTH
    );
    if sub_encoders.is_some() {
        info!("Bus backend: {} -> {}", TOPIC_RT_ENCODERS, TOPIC_RT_DUTY);
    }

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut ctrl_c => {
                info!("Shutting down, stopping wheels");
                let stop = serde_json::to_string(&WheelDuties::default())?;
                pub_duty.put(stop).await?;
                return Ok(());
            }
        }
        let now = started.elapsed();

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_cmd.try_recv() {
            let payload = sample.payload().to_bytes();
            if let Err(e) = runtime.on_command_payload(&payload, now) {
                warn!("Failed to parse command: {}", e);
            }
        }

        // 2. Latest encoder counts
        if let Some(sub) = &sub_encoders {
            while let Ok(Some(sample)) = sub.try_recv() {
                let payload = sample.payload().to_bytes();
                match serde_json::from_slice::<EncoderTicks>(&payload) {
                    Ok(ticks) => runtime.on_encoders(&ticks),
                    Err(e) => warn!("Failed to parse encoder ticks: {}", e),
                }
            }
        }

        // 3. Control cycle (includes watchdog logic)
        let report = runtime.step(now);
        let stamp = Stamp::now();

        // 4. Publish actuation and telemetry
        let duties = WheelDuties {
            duty: report.duties,
        };
        pub_duty.put(serde_json::to_string(&duties)?).await?;

        let odom = OdometryMsg::new(stamp, report.pose, report.robot_velocity);
        pub_odom.put(serde_json::to_string(&odom)?).await?;

        let joints = JointState::new(
            stamp,
            Some(report.joint_position),
            report.joint_velocity,
        );
        pub_joints.put(serde_json::to_string(&joints)?).await?;

        let wanted = JointState::new(stamp, None, report.wanted_wheel_velocities.as_array());
        pub_wanted.put(serde_json::to_string(&wanted)?).await?;

        pub_health.put(serde_json::to_string(&report.health)?).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYCLE: Duration = Duration::from_millis(20);

    fn forward(x: f64) -> BaseCommand {
        BaseCommand {
            x_vel: x,
            y_vel: 0.0,
            theta_vel: 0.0,
        }
    }

    /// Re-send `cmd` every cycle for `cycles` cycles, returning every report
    fn drive(runtime: &mut Runtime, cmd: &BaseCommand, cycles: u32) -> Vec<CycleReport> {
        (0..cycles)
            .map(|i| {
                let now = CYCLE * i;
                runtime.on_base_command(cmd, now);
                runtime.step(now)
            })
            .collect()
    }

    fn ki_on_all_channels(runtime: &Runtime) -> Vec<f64> {
        runtime
            .controller
            .manager()
            .channels()
            .iter()
            .map(|ch| ch.pid().gains().ki)
            .collect()
    }

    #[test]
    fn test_starts_stale_and_stopped() {
        let mut runtime = Runtime::new(&RobotConfig::default());
        let report = runtime.step(Duration::ZERO);
        assert_eq!(report.health, RuntimeHealth::CmdStale);
        assert_eq!(report.duties, [0.0; WHEEL_COUNT]);
    }

    #[test]
    fn test_watchdog_stops_robot() {
        let mut runtime = Runtime::new(&RobotConfig::default());
        runtime.on_base_command(&forward(0.3), Duration::ZERO);
        let report = runtime.step(Duration::ZERO);
        assert_eq!(report.health, RuntimeHealth::Ok);
        assert!(report.duties.iter().all(|&d| d > 0.0));

        let report = runtime.step(CMD_TIMEOUT + Duration::from_millis(1));
        assert_eq!(report.health, RuntimeHealth::CmdStale);
        assert_eq!(report.duties, [0.0; WHEEL_COUNT]);
        assert_eq!(report.wanted_wheel_velocities, WheelVelocities::zero());

        // Next command revives it
        let now = CMD_TIMEOUT * 2;
        runtime.on_base_command(&forward(0.3), now);
        assert_eq!(runtime.step(now).health, RuntimeHealth::Ok);
    }

    #[test]
    fn test_stop_after_stale_is_not_blended_with_old_command() {
        let mut runtime = Runtime::new(&RobotConfig::default());
        runtime.on_base_command(&forward(0.6), Duration::ZERO);
        runtime.step(Duration::ZERO);

        // Timed out
        let report = runtime.step(Duration::from_secs(1));
        assert_eq!(report.health, RuntimeHealth::CmdStale);

        // Operator sends an explicit stop
        for now in [Duration::from_millis(1020), Duration::from_millis(1220)] {
            runtime.on_base_command(&forward(0.0), now);
            let report = runtime.step(now);
            assert_eq!(report.health, RuntimeHealth::Ok);
            assert_eq!(report.wanted_wheel_velocities, WheelVelocities::zero());
            assert_eq!(report.duties, [0.0; WHEEL_COUNT]);
        }
        assert_eq!(ki_on_all_channels(&runtime), vec![0.125; WHEEL_COUNT]);
    }

    #[test]
    fn test_gain_schedule_applied_to_all_wheels() {
        let mut runtime = Runtime::new(&RobotConfig::default());
        runtime.on_base_command(&forward(0.6), Duration::ZERO);
        assert_eq!(ki_on_all_channels(&runtime), vec![0.25; WHEEL_COUNT]);

        let mut runtime = Runtime::new(&RobotConfig::default());
        let spin = BaseCommand {
            x_vel: 0.0,
            y_vel: 0.0,
            theta_vel: 1.2,
        };
        runtime.on_base_command(&spin, Duration::ZERO);
        assert_eq!(ki_on_all_channels(&runtime), vec![0.125 * 1.1; WHEEL_COUNT]);

        let mut runtime = Runtime::new(&RobotConfig::default());
        let small = BaseCommand {
            x_vel: 0.1,
            y_vel: 0.1,
            theta_vel: 0.1,
        };
        runtime.on_base_command(&small, Duration::ZERO);
        assert_eq!(ki_on_all_channels(&runtime), vec![0.125; WHEEL_COUNT]);
    }

    #[test]
    fn test_simulated_forward_drive_converges() {
        let mut runtime = Runtime::new(&RobotConfig::default());
        let reports = drive(&mut runtime, &forward(0.4), 200);

        let tail = &reports[reports.len() - 25..];
        let mean_vx = tail.iter().map(|r| r.robot_velocity.vx).sum::<f64>() / tail.len() as f64;
        assert!((mean_vx - 0.4).abs() < 0.05, "vx settled at {}", mean_vx);

        let last = reports.last().unwrap();
        assert!(last.pose.x > 1.0 && last.pose.x < 1.6, "x = {}", last.pose.x);
        assert!(last.pose.y.abs() < 1e-9);
        assert!(last.pose.theta.abs() < 1e-9);
        // Joint positions advance with the wheels
        assert!(last.joint_position.iter().all(|&p| p > 0.0));
        assert!(last.duties.iter().all(|&d| d >= 0.35));
    }

    #[test]
    fn test_simulated_strafe_keeps_heading() {
        let mut runtime = Runtime::new(&RobotConfig::default());
        let strafe = BaseCommand {
            x_vel: 0.0,
            y_vel: 0.3,
            theta_vel: 0.0,
        };
        let reports = drive(&mut runtime, &strafe, 200);
        let last = reports.last().unwrap();
        assert!((last.robot_velocity.vy - 0.3).abs() < 0.05);
        assert!(last.robot_velocity.vx.abs() < 1e-9);
        assert!(last.robot_velocity.omega.abs() < 1e-9);
        assert!(last.pose.y > 0.7);
        assert!(last.pose.x.abs() < 1e-9);
    }

    #[test]
    fn test_payload_parsing() {
        let mut runtime = Runtime::new(&RobotConfig::default());
        assert!(runtime.on_command_payload(b"not json", Duration::ZERO).is_err());
        runtime
            .on_command_payload(br#"{"x_vel":0.2,"y_vel":0.0,"theta_vel":0.0}"#, Duration::ZERO)
            .unwrap();
        assert_eq!(runtime.step(Duration::ZERO).health, RuntimeHealth::Ok);
    }

    #[test]
    fn test_joint_state_mode() {
        let config = RobotConfig {
            mode: ControlMode::JointState,
            ..RobotConfig::default()
        };
        let mut runtime = Runtime::new(&config);
        assert_eq!(runtime.mode(), ControlMode::JointState);

        // Body commands are ignored in this mode
        runtime.on_base_command(&forward(0.4), Duration::ZERO);
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);

        runtime
            .on_command_payload(br#"{"velocities":[5.0,5.0,5.0,5.0]}"#, Duration::ZERO)
            .unwrap();
        let report = runtime.step(Duration::ZERO);
        assert_eq!(report.health, RuntimeHealth::Ok);
        assert_eq!(
            report.wanted_wheel_velocities,
            WheelVelocities::new(5.0, 5.0, 5.0, 5.0)
        );
        assert!(report.duties.iter().all(|&d| d > 0.0));
    }

    #[test]
    fn test_bus_backend_reads_encoder_ticks() {
        let config = RobotConfig {
            backend: Backend::Bus,
            ..RobotConfig::default()
        };
        let mut runtime = Runtime::new(&config);
        runtime.step(Duration::ZERO);
        // One revolution per second on every wheel
        runtime.on_encoders(&EncoderTicks {
            ticks: [1440; WHEEL_COUNT],
        });
        let report = runtime.step(Duration::from_secs(1));
        let expected = crate::motor::WHEEL_RADIUS * std::f64::consts::TAU;
        assert!((report.robot_velocity.vx - expected).abs() < 1e-9);
        // Pose integration is capped at max_odometry_dt
        assert!((report.pose.x - expected * 0.2).abs() < 1e-9);
    }
}
