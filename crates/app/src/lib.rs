pub mod cli;
pub mod commands;
pub mod config;

pub use config::{Config, ConfigError, ImporterConfig};
