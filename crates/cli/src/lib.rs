//! DrowsyGuard command line front-end
//!
//! Configuration loading, logging setup and the subcommands of the
//! `drowsy-guard` binary.

pub mod commands;
pub mod config;
mod logging;

pub use commands::{AdminAction, App, SimulationPlan};
pub use config::AppConfig;
pub use logging::init_logging;
