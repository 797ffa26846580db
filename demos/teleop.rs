// Keyboard teleop for the mecanum base
//
// W/S forward/back, A/D strafe, Q/E rotate, +/- speed level, Space stop, Esc quit.
// Each axis is latched separately, so holding W and A together drives diagonally.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use mecanum_zenoh_runtime::config::{LOOP_HZ, TOPIC_CMD_BASE};
use mecanum_zenoh_runtime::messages::BaseCommand;
use std::time::{Duration, Instant};
use tracing::info;

// (linear m/s, angular rad/s) per speed level
const LEVELS: [(f64, f64); 3] = [(0.1, 0.3), (0.3, 0.8), (0.6, 1.5)];
const LEVEL_NAMES: [&str; 3] = ["LOW", "MED", "HIGH"];
// An axis drops back to zero when its key has not repeated for this long
const AXIS_HOLD: Duration = Duration::from_millis(150);

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
    Theta,
}

struct Teleop {
    level: usize,
    // Signed direction and time of the last key press, per axis
    axes: [(f64, Instant); 3],
}

impl Teleop {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            level: 0,
            axes: [(0.0, now); 3],
        }
    }

    /// Returns false when the user asked to quit
    fn on_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('w') => self.push(Axis::X, 1.0),
            KeyCode::Char('s') => self.push(Axis::X, -1.0),
            KeyCode::Char('a') => self.push(Axis::Y, 1.0),
            KeyCode::Char('d') => self.push(Axis::Y, -1.0),
            KeyCode::Char('q') => self.push(Axis::Theta, 1.0),
            KeyCode::Char('e') => self.push(Axis::Theta, -1.0),
            KeyCode::Char('+') | KeyCode::Char('=') => self.shift_level(1),
            KeyCode::Char('-') => self.shift_level(-1),
            KeyCode::Char(' ') => {
                for axis in &mut self.axes {
                    axis.0 = 0.0;
                }
            }
            KeyCode::Esc => return false,
            _ => {}
        }
        true
    }

    fn push(&mut self, axis: Axis, direction: f64) {
        self.axes[axis as usize] = (direction, Instant::now());
    }

    fn shift_level(&mut self, step: isize) {
        self.level = self.level.saturating_add_signed(step).min(LEVELS.len() - 1);
        info!("Speed: {}", LEVEL_NAMES[self.level]);
    }

    fn command(&self) -> BaseCommand {
        let (linear, angular) = LEVELS[self.level];
        let held = |axis: Axis| {
            let (direction, at) = self.axes[axis as usize];
            if at.elapsed() > AXIS_HOLD { 0.0 } else { direction }
        };
        BaseCommand {
            x_vel: held(Axis::X) * linear,
            y_vel: held(Axis::Y) * linear,
            theta_vel: held(Axis::Theta) * angular,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_BASE).await?;
    info!("Publishing to {}", TOPIC_CMD_BASE);
    info!("W/S=forward/back, A/D=strafe, Q/E=rotate, +/-=speed, Space=stop, Esc=quit");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    // Leave the base stopped
    let stop = BaseCommand {
        x_vel: 0.0,
        y_vel: 0.0,
        theta_vel: 0.0,
    };
    publisher.put(serde_json::to_string(&stop)?).await?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut teleop = Teleop::new();
    let period = Duration::from_secs_f64(1.0 / LOOP_HZ as f64);

    loop {
        // Drain every key event that arrived within one control period
        let deadline = Instant::now() + period;
        while let Some(timeout) = deadline.checked_duration_since(Instant::now()) {
            if !event::poll(timeout)? {
                break;
            }
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                if kind != KeyEventKind::Release && !teleop.on_key(code) {
                    return Ok(());
                }
            }
        }

        publisher.put(serde_json::to_string(&teleop.command())?).await?;
    }
}
