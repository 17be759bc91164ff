//! pdfops binary
//!
//! Entry point for the `passwd` and `optimize` commands.

use std::process::ExitCode;

use clap::Parser;
use pdfops::commands::failure_message;
use pdfops::{exit, execute, Cli, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout is reserved for the result line
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(exit::USAGE);
        }
    };

    match execute(&cli.command, &config) {
        Ok(outcome) => {
            println!("{}", outcome.message());
            ExitCode::from(exit::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", failure_message(&cli.command, &e));
            ExitCode::from(exit::exit_code(e.class()))
        }
    }
}
