pub mod command;
pub mod config;
pub mod controller;
pub mod messages;
pub mod motor;
pub mod odometry;
pub mod runtime;
