//! Foreman CLI - coordinate parallel agents and watch workflow health
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        reason = "Allow for tests"
    )
)]

use clap::Parser as _;
use cli::Cli;
use foreman_deps::tracing::error;
use std::process::ExitCode;

mod cli;
mod handlers;
mod logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(init_error) = logging::init(cli.log_file.as_deref()) {
        #[allow(clippy::print_stderr, reason = "Logging is not available yet")]
        {
            eprintln!("Failed to initialize logging: {init_error:#}");
        }
        return ExitCode::FAILURE;
    }

    match handlers::run(cli).await {
        Ok(code) => code,
        Err(command_error) => {
            error!("{command_error:#}");
            if let Err(output_error) = handlers::emit_error(&command_error) {
                error!("Failed to print error: {output_error}");
            }
            ExitCode::FAILURE
        }
    }
}
