// CLI module for tagforge

pub mod commands;
pub mod config;
pub mod output;

pub use commands::run;
pub use config::Config;
