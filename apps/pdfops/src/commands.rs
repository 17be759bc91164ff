//! Command dispatch

use pdfops_core::{optimize_with_options, passwd_with_options, OptimizeReport, PdfOpsError};

use crate::cli::Command;
use crate::config::Config;

#[derive(Debug)]
pub enum Outcome {
    PasswordChanged,
    Optimized(OptimizeReport),
}

impl Outcome {
    /// Line printed on stdout after success
    pub fn message(&self) -> String {
        match self {
            Outcome::PasswordChanged => "Password successfully changed".to_string(),
            Outcome::Optimized(report) => format!(
                "Optimized: {} -> {} bytes ({:.1}%) in {} ms",
                report.input_size_bytes,
                report.output_size_bytes,
                report.ratio_percent(),
                report.processing_time_ms
            ),
        }
    }
}

/// Run `command` with the config file defaults filled in
pub fn execute(command: &Command, config: &Config) -> Result<Outcome, PdfOpsError> {
    match command {
        Command::Passwd(args) => {
            passwd_with_options(
                &args.input_file,
                &args.output(),
                &args.password,
                &args.new_owner_password,
                &args.new_user_password,
                &args.options(&config.passwd),
            )?;
            Ok(Outcome::PasswordChanged)
        }
        Command::Optimize(args) => {
            let report = optimize_with_options(
                &args.input_file,
                &args.output(),
                &args.password,
                &args.options(&config.optimize),
            )?;
            Ok(Outcome::Optimized(report))
        }
    }
}

/// Line printed on stderr when `command` fails with `err`
pub fn failure_message(command: &Command, err: &PdfOpsError) -> String {
    match command {
        Command::Passwd(_) => format!("Could not change input file password: {}", err),
        Command::Optimize(_) => format!("Could not optimize input file: {}", err),
    }
}
