// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Cloud database paths for history, status and control records

use serde::{Deserialize, Serialize};

/// Configuration for the cloud-state collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Enable or disable the cloud channel entirely
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path receiving timestamped sensor+decision snapshots
    #[serde(default = "default_history_path")]
    pub history_path: String,

    /// Path receiving the current status record
    #[serde(default = "default_status_path")]
    pub status_path: String,

    /// Path watched for manual-override change events
    #[serde(default = "default_control_path")]
    pub control_path: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            history_path: default_history_path(),
            status_path: default_status_path(),
            control_path: default_control_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_history_path() -> String {
    "iot_data/history".to_string()
}

fn default_status_path() -> String {
    "iot_data/status".to_string()
}

fn default_control_path() -> String {
    "iot_data/control".to_string()
}
