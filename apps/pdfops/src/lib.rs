//! `pdfops` command-line front end
//!
//! Argument parsing, configuration and exit-status mapping live here so they
//! can be tested without spawning the binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod exit;

pub use cli::{Cli, Command, OptimizeArgs, PasswdArgs};
pub use commands::{execute, Outcome};
pub use config::Config;
