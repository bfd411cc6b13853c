// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Status LED driver
//!
//! Runs on its own cadence, independent of the sample loop: a blocked or
//! failing sample cycle must not stop the panel LEDs. Auto mode blinks the
//! LED, manual modes hold it steady on or off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use tokio::time;

use crate::control::{ControlMode, SharedControlState};
use crate::hardware::{OutputBank, OutputChannel};

/// Next LED level for one channel, given its mode and the level currently
/// shown.
pub fn next_level(mode: ControlMode, previous: bool) -> bool {
    match mode {
        ControlMode::Auto => !previous,
        ControlMode::On => true,
        ControlMode::Off => false,
    }
}

/// The periodic LED task.
pub struct IndicatorDriver {
    outputs: Arc<dyn OutputBank>,
    state: SharedControlState,
    interval: Duration,
    fan_level: bool,
    buzzer_level: bool,
}

impl IndicatorDriver {
    pub fn new(outputs: Arc<dyn OutputBank>, state: SharedControlState, interval: Duration) -> Self {
        Self {
            outputs,
            state,
            interval,
            fan_level: false,
            buzzer_level: false,
        }
    }

    /// Run until the shared running flag is cleared.
    pub async fn run(mut self, running: Arc<AtomicBool>) -> Result<()> {
        info!(
            "indicator driver started ({} ms cadence)",
            self.interval.as_millis()
        );
        let mut ticker = time::interval(self.interval);
        while running.load(Ordering::SeqCst) {
            ticker.tick().await;
            let (fan_mode, buzzer_mode) = {
                let snapshot = self.state.read().await;
                (snapshot.manual_fan, snapshot.manual_buzzer)
            };
            self.fan_level = next_level(fan_mode, self.fan_level);
            self.buzzer_level = next_level(buzzer_mode, self.buzzer_level);
            if let Err(e) = self
                .outputs
                .set(OutputChannel::FanIndicator, self.fan_level)
                .await
            {
                warn!("fan indicator write failed: {:#}", e);
            }
            if let Err(e) = self
                .outputs
                .set(OutputChannel::BuzzerIndicator, self.buzzer_level)
                .await
            {
                warn!("buzzer indicator write failed: {:#}", e);
            }
        }
        info!("indicator driver stopped");
        Ok(())
    }
}
