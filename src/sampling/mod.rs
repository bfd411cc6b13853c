// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Periodic sample loop
//!
//! Every cycle: read the sensor, snapshot the control state, derive the
//! actuator levels, drive the relay and buzzer, then fan the result out to
//! telemetry sinks. A failed cycle is logged and skipped; the loop itself
//! never dies over a bad read, only over shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::RwLock;
use tokio::time::{self, Instant};

use crate::config::BrokerConfig;
use crate::control::policy::{decide, ActuatorDecision, SensorReading};
use crate::control::SharedControlState;
use crate::hardware::{ClimateSensor, OutputBank, OutputChannel};
use crate::remote::broker::BrokerPublisher;
use crate::remote::cloud::{CloudWriter, HistoryRecord, StatusRecord};

/// The most recent completed sample, kept for status queries.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestSample {
    pub reading: SensorReading,
    pub decision: ActuatorDecision,
    /// Threshold in force when the decision was taken
    pub threshold: f64,
    pub taken_at: DateTime<Utc>,
}

/// Latest sample shared with the chat handler. `None` until the first
/// successful cycle.
pub type SharedLatestSample = Arc<RwLock<Option<LatestSample>>>;

/// Create a new shared latest-sample slot.
pub fn create_shared_latest_sample() -> SharedLatestSample {
    Arc::new(RwLock::new(None))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn on_off(level: bool) -> &'static str {
    if level {
        "on"
    } else {
        "off"
    }
}

/// The periodic sensing and actuation task.
pub struct SampleLoop {
    sensor: Box<dyn ClimateSensor>,
    outputs: Arc<dyn OutputBank>,
    state: SharedControlState,
    latest: SharedLatestSample,
    interval: Duration,
    broker: Option<(Arc<dyn BrokerPublisher>, BrokerConfig)>,
    cloud: Option<Arc<dyn CloudWriter>>,
}

impl SampleLoop {
    pub fn new(
        sensor: Box<dyn ClimateSensor>,
        outputs: Arc<dyn OutputBank>,
        state: SharedControlState,
        latest: SharedLatestSample,
        interval: Duration,
    ) -> Self {
        Self {
            sensor,
            outputs,
            state,
            latest,
            interval,
            broker: None,
            cloud: None,
        }
    }

    /// Attach a broker telemetry sink.
    pub fn with_broker(mut self, publisher: Arc<dyn BrokerPublisher>, topics: BrokerConfig) -> Self {
        self.broker = Some((publisher, topics));
        self
    }

    /// Attach a cloud telemetry sink.
    pub fn with_cloud(mut self, writer: Arc<dyn CloudWriter>) -> Self {
        self.cloud = Some(writer);
        self
    }

    /// Run until the shared running flag is cleared.
    pub async fn run(mut self, running: Arc<AtomicBool>) -> Result<()> {
        info!("sample loop started ({} ms cadence)", self.interval.as_millis());
        let started = Instant::now();
        let mut ticker = time::interval(self.interval);
        while running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.cycle(started.elapsed().as_secs()).await {
                        error!("sample cycle failed, waiting for next tick: {:#}", e);
                    }
                }
                // Wake up periodically so shutdown is not gated on the tick
                _ = time::sleep(Duration::from_millis(250)) => {}
            }
        }
        info!("sample loop stopped");
        Ok(())
    }

    async fn cycle(&mut self, uptime_seconds: u64) -> Result<()> {
        let reading = self.sensor.read().await.context("sensor read failed")?;
        let snapshot = self.state.read().await.clone();
        let decision = decide(&reading, &snapshot);

        self.outputs
            .set(OutputChannel::FanRelay, decision.fan_on)
            .await
            .context("failed to drive fan relay")?;
        self.outputs
            .set(OutputChannel::Buzzer, decision.buzzer_on)
            .await
            .context("failed to drive buzzer")?;

        *self.latest.write().await = Some(LatestSample {
            reading,
            decision,
            threshold: snapshot.threshold,
            taken_at: Utc::now(),
        });

        debug!(
            "sample: {:.2} C / {:.2} % | fan {} ({}) | buzzer {} ({}) | threshold {}",
            reading.temperature,
            reading.humidity,
            on_off(decision.fan_on),
            snapshot.manual_fan.as_token(),
            on_off(decision.buzzer_on),
            snapshot.manual_buzzer.as_token(),
            snapshot.threshold,
        );

        self.publish_telemetry(&reading, &decision, snapshot.threshold, uptime_seconds)
            .await;
        Ok(())
    }

    /// Push the cycle result to the attached sinks. Sink failures are logged
    /// and do not fail the cycle: actuation already happened.
    async fn publish_telemetry(
        &self,
        reading: &SensorReading,
        decision: &ActuatorDecision,
        threshold: f64,
        uptime_seconds: u64,
    ) {
        if let Some((publisher, topics)) = &self.broker {
            let payload = serde_json::json!({
                "temperature": round2(reading.temperature),
                "humidity": round2(reading.humidity),
            })
            .to_string();
            let messages = [
                (&topics.sensor_topic, payload.as_str(), false),
                (&topics.status_fan_topic, on_off(decision.fan_on), false),
                (&topics.status_buzzer_topic, on_off(decision.buzzer_on), false),
            ];
            for (topic, payload, retain) in messages {
                if let Err(e) = publisher.publish(topic, payload, retain).await {
                    warn!("broker publish to {} failed: {:#}", topic, e);
                }
            }
            let threshold_payload = threshold.to_string();
            if let Err(e) = publisher
                .publish(&topics.status_threshold_topic, &threshold_payload, false)
                .await
            {
                warn!("broker publish to {} failed: {:#}", topics.status_threshold_topic, e);
            }
            let uptime_payload = uptime_seconds.to_string();
            if let Err(e) = publisher
                .publish(&topics.uptime_topic, &uptime_payload, true)
                .await
            {
                warn!("broker publish to {} failed: {:#}", topics.uptime_topic, e);
            }
        }

        if let Some(writer) = &self.cloud {
            let history = HistoryRecord {
                timestamp: Utc::now(),
                temperature: round2(reading.temperature),
                humidity: round2(reading.humidity),
                fan_on: decision.fan_on,
                buzzer_on: decision.buzzer_on,
            };
            if let Err(e) = writer.write_history(&history).await {
                warn!("cloud history write failed: {:#}", e);
            }
            let status = StatusRecord {
                fan: on_off(decision.fan_on).to_string(),
                buzzer: on_off(decision.buzzer_on).to_string(),
                threshold,
                uptime_seconds,
            };
            if let Err(e) = writer.write_status(&status).await {
                warn!("cloud status write failed: {:#}", e);
            }
        }
    }
}
