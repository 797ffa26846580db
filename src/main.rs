use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mecanum_zenoh_runtime::config::{Backend, LOOP_HZ, RobotConfig};

/// Mecanum base control runtime
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON robot config; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run against the simulated drivetrain regardless of the config
    #[arg(long)]
    sim: bool,

    /// Control loop rate
    #[arg(long, default_value_t = LOOP_HZ, value_parser = clap::value_parser!(u64).range(1..=1000))]
    loop_hz: u64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match RobotConfig::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(1);
            }
        },
        None => RobotConfig::default(),
    };
    if args.sim {
        config.backend = Backend::Simulated;
    }

    if let Err(e) = mecanum_zenoh_runtime::runtime::run(config, args.loop_hz).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
