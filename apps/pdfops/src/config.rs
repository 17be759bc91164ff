//! Configuration file
//!
//! An optional TOML file supplies defaults for settings that have no flag or
//! whose flag was omitted. Every key is optional; unknown keys are errors.

use std::fs;
use std::path::Path;

use anyhow::Context;
use pdfops_core::{OptimizeOptions, PasswdOptions};
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub optimize: OptimizeConfig,
    #[serde(default)]
    pub passwd: PasswdConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizeConfig {
    pub image_quality: Option<u8>,
    pub image_ppi: Option<f64>,
    pub use_object_streams: Option<bool>,
    pub objects_per_stream: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswdConfig {
    /// RC4 key length in bits
    pub key_length: Option<usize>,
}

impl OptimizeConfig {
    /// Overlay the configured values on `options`
    pub fn apply(&self, mut options: OptimizeOptions) -> OptimizeOptions {
        if let Some(quality) = self.image_quality {
            options.image_quality = quality;
        }
        if self.image_ppi.is_some() {
            options.image_ppi = self.image_ppi;
        }
        if let Some(enabled) = self.use_object_streams {
            options.use_object_streams = enabled;
        }
        if let Some(count) = self.objects_per_stream {
            options.objects_per_stream = count;
        }
        options
    }
}

impl Config {
    /// Read the file at `path`, or the defaults when no file is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.optimize.apply(OptimizeOptions::default()).validate()?;
        if let Some(key_length) = self.passwd.key_length {
            PasswdOptions { key_length }.validate()?;
        }
        Ok(())
    }
}
