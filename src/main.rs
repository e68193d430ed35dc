// CLI binary entry point for tagforge

use std::process;

use clap::Parser;

mod cli;

use cli::Config;

fn main() {
    let config = Config::parse();

    if config.verbose && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "debug");
    }
    lovely_env_logger::init_default();

    if let Err(e) = cli::run(&config) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
