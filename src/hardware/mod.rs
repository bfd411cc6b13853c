// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Hardware collaborators for the bakery controller
//!
//! This module provides the trait seams for the two physical collaborators:
//! - the climate sensor (BME280 on the I2C bus)
//! - the output bank (fan relay, buzzer and the two status LEDs)
//!
//! Two driver implementations exist per seam:
//! - Native: direct access to Raspberry Pi hardware
//! - Mock: simulation driver for testing and development

pub mod mock;
pub mod native;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::hardware::{HardwareConfig, HardwareDriver};
use crate::control::policy::SensorReading;

/// Physical output channels driven by the controller.
///
/// The relay and buzzer are driven only by the sample loop; the two
/// indicators only by the indicator driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputChannel {
    FanRelay,
    Buzzer,
    FanIndicator,
    BuzzerIndicator,
}

impl OutputChannel {
    /// All channels, in safe-shutdown order.
    pub const ALL: [OutputChannel; 4] = [
        OutputChannel::FanRelay,
        OutputChannel::Buzzer,
        OutputChannel::FanIndicator,
        OutputChannel::BuzzerIndicator,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OutputChannel::FanRelay => "fan_relay",
            OutputChannel::Buzzer => "buzzer",
            OutputChannel::FanIndicator => "fan_indicator",
            OutputChannel::BuzzerIndicator => "buzzer_indicator",
        }
    }
}

/// Climate sensor seam. A read may fail on any cycle; the sample loop
/// tolerates the failure and skips to the next tick.
#[async_trait]
pub trait ClimateSensor: Send + Sync {
    async fn read(&mut self) -> Result<SensorReading>;
}

/// Output bank seam. Channel writes are independent, so the sample loop and
/// the indicator driver can each drive their own channels concurrently.
#[async_trait]
pub trait OutputBank: Send + Sync {
    async fn set(&self, channel: OutputChannel, on: bool) -> Result<()>;

    /// Force every channel off. Called on the shutdown path after the
    /// periodic tasks have stopped.
    async fn safe_shutdown(&self) -> Result<()> {
        for channel in OutputChannel::ALL {
            self.set(channel, false).await?;
        }
        Ok(())
    }
}

/// Create the climate sensor driver selected by the configuration.
pub fn create_climate_sensor(config: &HardwareConfig) -> Result<Box<dyn ClimateSensor>> {
    match config.driver {
        HardwareDriver::Native => Ok(Box::new(native::NativeBme280Sensor::new(
            &config.i2c_device,
            config.sensor_address,
        )?)),
        HardwareDriver::Mock => Ok(Box::new(mock::MockClimateSensor::new())),
    }
}

/// Create the output bank driver selected by the configuration.
pub fn create_output_bank(config: &HardwareConfig) -> Result<Arc<dyn OutputBank>> {
    match config.driver {
        HardwareDriver::Native => Ok(Arc::new(native::NativeGpioBank::new()?)),
        HardwareDriver::Mock => Ok(Arc::new(mock::MockOutputBank::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_safe_shutdown_forces_all_channels_off() {
        let bank = mock::MockOutputBank::new();
        for channel in OutputChannel::ALL {
            bank.set(channel, true).await.unwrap();
        }
        bank.safe_shutdown().await.unwrap();
        for channel in OutputChannel::ALL {
            assert!(!bank.level(channel), "{} still on", channel.name());
        }
    }

    #[test]
    fn test_mock_factory() {
        let config = HardwareConfig::default();
        assert!(create_climate_sensor(&config).is_ok());
        assert!(create_output_bank(&config).is_ok());
    }
}
