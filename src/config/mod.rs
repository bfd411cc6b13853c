// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Configuration for the bakery climate controller
//!
//! The configuration is a YAML file parsed into one struct per subsystem.
//! Every field carries a serde default, so an empty file yields a fully
//! working mock-driver configuration.

pub mod broker;
pub mod chat;
pub mod cloud;
pub mod control;
pub mod hardware;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use broker::BrokerConfig;
pub use chat::ChatConfig;
pub use control::ControlConfig;
pub use hardware::HardwareConfig;
pub use cloud::CloudConfig;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub hardware: HardwareConfig,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub cloud: CloudConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

impl Config {
    /// Load and validate a configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate rules that the YAML schema cannot express.
    pub fn validate(&self) -> Result<()> {
        if !self.control.initial_threshold.is_finite() {
            anyhow::bail!(
                "control.initial_threshold must be a finite number, got {}",
                self.control.initial_threshold
            );
        }
        if self.control.sample_interval_ms == 0 {
            anyhow::bail!("control.sample_interval_ms must be greater than zero");
        }
        if self.control.indicator_interval_ms == 0 {
            anyhow::bail!("control.indicator_interval_ms must be greater than zero");
        }
        Ok(())
    }
}
