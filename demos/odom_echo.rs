// Prints odometry and health published by the runtime, once per second
//
// Usage: cargo run --example odom_echo
use mecanum_zenoh_runtime::config::{TOPIC_HEALTH, TOPIC_ODOM};
use mecanum_zenoh_runtime::messages::{OdometryMsg, RuntimeHealth};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let sub_odom = session.declare_subscriber(TOPIC_ODOM).await?;
    let sub_health = session.declare_subscriber(TOPIC_HEALTH).await?;
    info!("Listening on {}, {}", TOPIC_ODOM, TOPIC_HEALTH);

    let mut health = None;
    let mut last_print = Instant::now();

    loop {
        tokio::select! {
            sample = sub_odom.recv_async() => {
                let sample = sample?;
                let payload = sample.payload().to_bytes();
                let odom: OdometryMsg = match serde_json::from_slice(&payload) {
                    Ok(odom) => odom,
                    Err(e) => {
                        warn!("Bad odometry payload: {}", e);
                        continue;
                    }
                };
                if last_print.elapsed() >= Duration::from_secs(1) {
                    last_print = Instant::now();
                    println!(
                        "[{:?}] x={:+.3} m  y={:+.3} m  theta={:+.3} rad | vx={:+.3} vy={:+.3} w={:+.3}",
                        health,
                        odom.pose.x,
                        odom.pose.y,
                        odom.pose.theta,
                        odom.twist.vx,
                        odom.twist.vy,
                        odom.twist.omega
                    );
                }
            }
            sample = sub_health.recv_async() => {
                let sample = sample?;
                let payload = sample.payload().to_bytes();
                health = serde_json::from_slice::<RuntimeHealth>(&payload).ok();
            }
        }
    }
}
