//! Binary entry point.
//!
//! Logging goes to stderr (env_logger's default) so stdout stays clean for
//! the wizard's terminal UI. `RUST_LOG` overrides the default `info`
//! filter.

#![warn(clippy::all, rust_2018_idioms)]

mod cli;

use clap::Parser as _;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::Cli::parse();
    if let Err(e) = cli::run(cli) {
        // A user quit is a clean exit, not a failure.
        if biodata::error::is_abort(&e) {
            return;
        }
        log::error!("Critical error during execution: {e:#}");
        std::process::exit(1);
    }
}
