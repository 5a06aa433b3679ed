pub mod commands;
pub mod config;
pub mod tracing_setup;

pub use commands::{load_local_videos, run_command, CliCommand};
pub use config::{CliConfig, Credentials};
pub use tracing_setup::init_tracing;
