// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Control loop cadence and policy defaults

use serde::{Deserialize, Serialize};

/// Configuration for the control loop and indicator driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Auto-mode temperature threshold at startup, in Celsius
    #[serde(default = "default_initial_threshold")]
    pub initial_threshold: f64,

    /// Sample loop cadence in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Indicator (LED blink) cadence in milliseconds
    #[serde(default = "default_indicator_interval_ms")]
    pub indicator_interval_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            initial_threshold: default_initial_threshold(),
            sample_interval_ms: default_sample_interval_ms(),
            indicator_interval_ms: default_indicator_interval_ms(),
        }
    }
}

fn default_initial_threshold() -> f64 {
    27.5
}

fn default_sample_interval_ms() -> u64 {
    5000
}

fn default_indicator_interval_ms() -> u64 {
    500
}
