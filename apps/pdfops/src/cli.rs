//! Command-line surface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pdfops_core::{output_path, OptimizeOptions, PasswdOptions};

use crate::config::{OptimizeConfig, PasswdConfig};

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "pdfops")]
#[command(version, about = "Change PDF passwords and optimize PDF files")]
pub struct Cli {
    /// TOML file with default settings
    #[arg(short, long, global = true, env = "PDFOPS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log every optimization pass
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Set new owner and user passwords
    Passwd(PasswdArgs),
    /// Shrink a PDF file
    Optimize(OptimizeArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct PasswdArgs {
    /// Output file, defaults to overwriting the input
    #[arg(short = 'o', long = "output-file")]
    pub output_file: Option<PathBuf>,

    /// Current password of an encrypted input
    #[arg(short, long, default_value = "")]
    pub password: String,

    pub input_file: PathBuf,
    pub new_owner_password: String,
    pub new_user_password: String,
}

impl PasswdArgs {
    pub fn output(&self) -> PathBuf {
        output_path(&self.input_file, self.output_file.as_deref())
    }

    pub fn options(&self, config: &PasswdConfig) -> PasswdOptions {
        let mut options = PasswdOptions::default();
        if let Some(key_length) = config.key_length {
            options.key_length = key_length;
        }
        options
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct OptimizeArgs {
    /// Output file, defaults to overwriting the input
    #[arg(short = 'o', long = "output-file")]
    pub output_file: Option<PathBuf>,

    /// Current password of an encrypted input
    #[arg(short, long, default_value = "")]
    pub password: String,

    /// JPEG quality for recompressed images (1-100)
    #[arg(short = 'q', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub image_quality: Option<u8>,

    /// Downsample images above this many pixels per inch
    #[arg(short = 'P', long, value_parser = parse_ppi)]
    pub image_ppi: Option<f64>,

    pub input_file: PathBuf,
}

impl OptimizeArgs {
    pub fn output(&self) -> PathBuf {
        output_path(&self.input_file, self.output_file.as_deref())
    }

    /// Flags first, then the config file, then built-in defaults
    pub fn options(&self, config: &OptimizeConfig) -> OptimizeOptions {
        let mut options = config.apply(OptimizeOptions::default());
        if let Some(quality) = self.image_quality {
            options.image_quality = quality;
        }
        if self.image_ppi.is_some() {
            options.image_ppi = self.image_ppi;
        }
        options
    }
}

fn parse_ppi(value: &str) -> Result<f64, String> {
    let ppi: f64 = value
        .parse()
        .map_err(|_| format!("`{}` is not a number", value))?;
    if !ppi.is_finite() || ppi <= 0.0 {
        return Err(format!("PPI must be positive, got {}", value));
    }
    Ok(ppi)
}
