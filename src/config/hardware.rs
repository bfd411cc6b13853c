// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Hardware driver selection and sensor bus settings

use serde::{Deserialize, Serialize};

/// Configuration for the sensor and output drivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Driver selection for both the sensor and the output bank
    #[serde(default)]
    pub driver: HardwareDriver,

    /// I2C device path for the native sensor driver
    #[serde(default = "default_i2c_device")]
    pub i2c_device: String,

    /// BME280 I2C address
    #[serde(default = "default_sensor_address")]
    pub sensor_address: u8,
}

/// Hardware driver type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareDriver {
    /// Direct Raspberry Pi hardware access
    Native,
    /// Simulation driver for testing and development
    #[default]
    Mock,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            driver: HardwareDriver::default(),
            i2c_device: default_i2c_device(),
            sensor_address: default_sensor_address(),
        }
    }
}

fn default_i2c_device() -> String {
    "/dev/i2c-1".to_string()
}

fn default_sensor_address() -> u8 {
    0x76
}
