//! Tubesaver - download audio and video with yt-dlp from the command line.
//!
//! This is the entry point for the `tubesaver` binary.

mod cli;
mod commands;
mod logging;
mod terminal;

use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tubesaver_core::AppPaths;

use cli::Cli;
use commands::AppState;
use logging::LoggingConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let paths = AppPaths::new(cli.base_dir.clone().unwrap_or_else(AppPaths::default_root));

    let _logging = match logging::init(&LoggingConfig::for_verbosity(paths.log_dir(), cli.verbose)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {e}");
            None
        }
    };

    info!("Starting tubesaver {}", env!("CARGO_PKG_VERSION"));
    let state = AppState::new(paths.root().to_path_buf(), cli.assume_yes);

    match commands::run(&state, cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            info!(context = "Cli", kind = ?e.kind(), "Command failed: {}", e);
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
