// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Broker topic layout
//!
//! Topic names default to the layout the dashboards already subscribe to;
//! override them here when the broker uses a different namespace.

use serde::{Deserialize, Serialize};

/// Configuration for the message-broker collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Enable or disable the broker channel entirely
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Telemetry topic for sensor readings (JSON payload)
    #[serde(default = "default_sensor_topic")]
    pub sensor_topic: String,

    /// Inbound control topic for the fan ("on"/"off"/"auto")
    #[serde(default = "default_fan_topic")]
    pub fan_topic: String,

    /// Inbound control topic for the buzzer ("on"/"off"/"auto")
    #[serde(default = "default_buzzer_topic")]
    pub buzzer_topic: String,

    /// Inbound topic for threshold updates (decimal numeral)
    #[serde(default = "default_threshold_topic")]
    pub threshold_topic: String,

    #[serde(default = "default_status_fan_topic")]
    pub status_fan_topic: String,

    #[serde(default = "default_status_buzzer_topic")]
    pub status_buzzer_topic: String,

    #[serde(default = "default_status_threshold_topic")]
    pub status_threshold_topic: String,

    #[serde(default = "default_uptime_topic")]
    pub uptime_topic: String,

    /// Retained online/offline marker
    #[serde(default = "default_availability_topic")]
    pub availability_topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            sensor_topic: default_sensor_topic(),
            fan_topic: default_fan_topic(),
            buzzer_topic: default_buzzer_topic(),
            threshold_topic: default_threshold_topic(),
            status_fan_topic: default_status_fan_topic(),
            status_buzzer_topic: default_status_buzzer_topic(),
            status_threshold_topic: default_status_threshold_topic(),
            uptime_topic: default_uptime_topic(),
            availability_topic: default_availability_topic(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sensor_topic() -> String {
    "sensor/bme280".to_string()
}

fn default_fan_topic() -> String {
    "control/fan".to_string()
}

fn default_buzzer_topic() -> String {
    "control/buzzer".to_string()
}

fn default_threshold_topic() -> String {
    "config/threshold".to_string()
}

fn default_status_fan_topic() -> String {
    "status/fan".to_string()
}

fn default_status_buzzer_topic() -> String {
    "status/buzzer".to_string()
}

fn default_status_threshold_topic() -> String {
    "status/threshold".to_string()
}

fn default_uptime_topic() -> String {
    "status/uptime".to_string()
}

fn default_availability_topic() -> String {
    "status/availability".to_string()
}
