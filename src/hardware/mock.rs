// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Mock hardware drivers for testing and development
//!
//! The mock sensor runs a small ambient-air simulation so the control loop
//! produces plausible telemetry without a BME280 attached; the mock output
//! bank records the last level written to each channel for assertions.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use rand::{Rng, RngExt};

use super::{ClimateSensor, OutputBank, OutputChannel};
use crate::control::policy::SensorReading;

/// Ambient bakery air temperature the simulation settles toward, in Celsius.
const AMBIENT_TEMP_C: f64 = 26.0;
/// Ambient relative humidity in percent.
const AMBIENT_HUMIDITY_PCT: f64 = 55.0;
/// Fraction of the distance to ambient recovered per second.
const RELAXATION_PER_SEC: f64 = 0.02;

/// Simulated BME280: a slow random walk around ambient conditions.
pub struct MockClimateSensor {
    temperature: f64,
    humidity: f64,
    last_read: Instant,
}

impl MockClimateSensor {
    pub fn new() -> Self {
        Self {
            temperature: AMBIENT_TEMP_C,
            humidity: AMBIENT_HUMIDITY_PCT,
            last_read: Instant::now(),
        }
    }
}

impl Default for MockClimateSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClimateSensor for MockClimateSensor {
    async fn read(&mut self) -> Result<SensorReading> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_read).as_secs_f64().min(60.0);
        self.last_read = now;

        let mut rng = rand::rng();
        let pull = RELAXATION_PER_SEC * dt;
        self.temperature += (AMBIENT_TEMP_C - self.temperature) * pull
            + rng.random_range(-0.08..0.08);
        self.humidity = (self.humidity
            + (AMBIENT_HUMIDITY_PCT - self.humidity) * pull
            + rng.random_range(-0.3..0.3))
        .clamp(0.0, 100.0);

        debug!(
            "mock sensor read: {:.2} C, {:.2} %",
            self.temperature, self.humidity
        );
        Ok(SensorReading {
            temperature: self.temperature,
            humidity: self.humidity,
        })
    }
}

/// Mock output bank recording the last level written per channel.
pub struct MockOutputBank {
    levels: Mutex<HashMap<OutputChannel, bool>>,
}

impl MockOutputBank {
    pub fn new() -> Self {
        Self {
            levels: Mutex::new(HashMap::new()),
        }
    }

    /// Last level written to a channel; off if never written.
    pub fn level(&self, channel: OutputChannel) -> bool {
        self.levels
            .lock()
            .map(|levels| levels.get(&channel).copied().unwrap_or(false))
            .unwrap_or(false)
    }
}

impl Default for MockOutputBank {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputBank for MockOutputBank {
    async fn set(&self, channel: OutputChannel, on: bool) -> Result<()> {
        let mut levels = self
            .levels
            .lock()
            .map_err(|_| anyhow!("output levels lock poisoned"))?;
        levels.insert(channel, on);
        debug!("output {} -> {}", channel.name(), if on { "on" } else { "off" });
        Ok(())
    }
}
