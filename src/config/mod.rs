#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{Cli, CliCommand, ExportFormat, WorkOrderArgs};
pub use toml_config::EngineConfig;
