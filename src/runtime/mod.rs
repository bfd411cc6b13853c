// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Daemon lifecycle
//!
//! The daemon owns every long-lived task: the sample loop, the indicator
//! driver, one listener per enabled remote collaborator and a heartbeat.
//! Shutdown clears a shared flag, joins every task with a timeout, forces
//! the outputs off and finally marks the controller offline on the broker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

use crate::config::{BrokerConfig, Config};
use crate::control::{create_shared_control_state, SharedControlState};
use crate::hardware::{create_climate_sensor, create_output_bank, ClimateSensor, OutputBank};
use crate::indicator::IndicatorDriver;
use crate::remote::broker::{self, BrokerLink, BrokerPublisher, BrokerSubscriber};
use crate::remote::chat::{self, ChatLink, ChatTransport};
use crate::remote::cloud::{self, CloudLink, CloudSubscriber, CloudWriter};
use crate::sampling::{create_shared_latest_sample, SampleLoop, SharedLatestSample};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Container for all daemon tasks and the handles shared between them.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    control: Option<SharedControlState>,
    latest: SharedLatestSample,
    outputs: Option<Arc<dyn OutputBank>>,
    broker_publisher: Option<Arc<dyn BrokerPublisher>>,
    broker_topics: Option<BrokerConfig>,
    broker_link: Option<BrokerLink>,
    cloud_link: Option<CloudLink>,
    chat_link: Option<ChatLink>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance with no active tasks.
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            control: None,
            latest: create_shared_latest_sample(),
            outputs: None,
            broker_publisher: None,
            broker_topics: None,
            broker_link: None,
            cloud_link: None,
            chat_link: None,
        }
    }

    /// Launch every task selected by the configuration.
    ///
    /// Fails fast when the hardware cannot be opened or the startup sensor
    /// probe fails; a controller that cannot sense must not start.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let control = create_shared_control_state(config.control.initial_threshold);
        self.control = Some(control.clone());

        let outputs = create_output_bank(&config.hardware)?;
        self.outputs = Some(outputs.clone());

        let mut sensor = create_climate_sensor(&config.hardware)?;
        let probe = sensor
            .read()
            .await
            .context("startup sensor probe failed")?;
        info!(
            "sensor probe ok: {:.2} C / {:.2} %",
            probe.temperature, probe.humidity
        );

        let mut broker_sink = None;
        if config.broker.enabled {
            let (publisher, subscriber, link) = broker::connect_in_process();
            publisher
                .publish(&config.broker.availability_topic, "online", true)
                .await
                .context("failed to announce availability")?;
            self.start_broker_listener(subscriber, config.broker.clone(), control.clone());
            broker_sink = Some((publisher.clone(), config.broker.clone()));
            self.broker_publisher = Some(publisher);
            self.broker_topics = Some(config.broker.clone());
            self.broker_link = Some(link);
        }

        let mut cloud_sink = None;
        if config.cloud.enabled {
            let (writer, subscriber, link) = cloud::connect_in_process(&config.cloud);
            self.start_cloud_listener(subscriber, control.clone());
            cloud_sink = Some(writer);
            self.cloud_link = Some(link);
        }

        if config.chat.enabled {
            let (transport, link) = chat::connect_in_process();
            self.start_chat_handler(transport, control.clone());
            self.chat_link = Some(link);
        }

        self.start_indicator_driver(
            outputs.clone(),
            control.clone(),
            Duration::from_millis(config.control.indicator_interval_ms),
        );
        self.start_sample_loop(
            sensor,
            outputs,
            control,
            Duration::from_millis(config.control.sample_interval_ms),
            broker_sink,
            cloud_sink,
        );
        self.start_heartbeat();

        info!("daemon launched with {} tasks", self.tasks.len());
        Ok(())
    }

    fn start_sample_loop(
        &mut self,
        sensor: Box<dyn ClimateSensor>,
        outputs: Arc<dyn OutputBank>,
        control: SharedControlState,
        interval: Duration,
        broker_sink: Option<(Arc<dyn BrokerPublisher>, BrokerConfig)>,
        cloud_sink: Option<Arc<dyn CloudWriter>>,
    ) {
        let mut sample_loop = SampleLoop::new(sensor, outputs, control, self.latest.clone(), interval);
        if let Some((publisher, topics)) = broker_sink {
            sample_loop = sample_loop.with_broker(publisher, topics);
        }
        if let Some(writer) = cloud_sink {
            sample_loop = sample_loop.with_cloud(writer);
        }
        let running = self.running.clone();
        self.tasks.push(tokio::spawn(sample_loop.run(running)));
    }

    fn start_indicator_driver(
        &mut self,
        outputs: Arc<dyn OutputBank>,
        control: SharedControlState,
        interval: Duration,
    ) {
        let driver = IndicatorDriver::new(outputs, control, interval);
        let running = self.running.clone();
        self.tasks.push(tokio::spawn(driver.run(running)));
    }

    fn start_broker_listener(
        &mut self,
        subscriber: Box<dyn BrokerSubscriber>,
        topics: BrokerConfig,
        control: SharedControlState,
    ) {
        let running = self.running.clone();
        self.tasks
            .push(tokio::spawn(broker::run_listener(subscriber, topics, control, running)));
    }

    fn start_cloud_listener(
        &mut self,
        subscriber: Box<dyn CloudSubscriber>,
        control: SharedControlState,
    ) {
        let running = self.running.clone();
        self.tasks
            .push(tokio::spawn(cloud::run_listener(subscriber, control, running)));
    }

    fn start_chat_handler(&mut self, transport: Box<dyn ChatTransport>, control: SharedControlState) {
        let running = self.running.clone();
        let latest = self.latest.clone();
        self.tasks
            .push(tokio::spawn(chat::run_handler(transport, control, latest, running)));
    }

    fn start_heartbeat(&mut self) {
        let running = self.running.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            ticker.tick().await;
            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = ticker.tick() => debug!("daemon heartbeat"),
                    _ = tokio::time::sleep(Duration::from_millis(250)) => {}
                }
            }
            Ok(())
        }));
    }

    /// Signal every task to stop. Idempotent; returns immediately.
    pub fn shutdown(&self) {
        info!("shutting down daemon");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for every task to stop, then force the outputs to the safe OFF
    /// state and mark the controller offline.
    pub async fn join(mut self) -> Result<()> {
        for task in self.tasks.drain(..) {
            match tokio::time::timeout(JOIN_TIMEOUT, task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!("task ended with error: {:#}", e),
                Ok(Err(e)) => error!("task panicked: {}", e),
                Err(_) => warn!("task did not stop within {:?}", JOIN_TIMEOUT),
            }
        }

        if let Some(outputs) = &self.outputs {
            if let Err(e) = outputs.safe_shutdown().await {
                error!("failed to force outputs off: {:#}", e);
            }
        }

        if let (Some(publisher), Some(topics)) = (&self.broker_publisher, &self.broker_topics) {
            if let Err(e) = publisher
                .publish(&topics.availability_topic, "offline", true)
                .await
            {
                warn!("failed to announce offline state: {:#}", e);
            }
        }

        info!("daemon stopped");
        Ok(())
    }

    /// Shared control state, once launched.
    pub fn control_state(&self) -> Option<&SharedControlState> {
        self.control.as_ref()
    }

    /// Latest completed sample slot.
    pub fn latest_sample(&self) -> &SharedLatestSample {
        &self.latest
    }

    /// Broker-side handle, when the broker channel is enabled.
    pub fn broker_link(&self) -> Option<&BrokerLink> {
        self.broker_link.as_ref()
    }

    /// Cloud-side handle, when the cloud channel is enabled.
    pub fn cloud_link(&self) -> Option<&CloudLink> {
        self.cloud_link.as_ref()
    }

    /// Chat-side handle, when the chat channel is enabled.
    pub fn chat_link(&self) -> Option<&ChatLink> {
        self.chat_link.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlMode;

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.control.sample_interval_ms = 20;
        config.control.indicator_interval_ms = 10;
        config
    }

    #[tokio::test]
    async fn test_launch_run_and_clean_shutdown() {
        let mut daemon = Daemon::new();
        daemon.launch(&fast_config()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(daemon.latest_sample().read().await.is_some());

        let broker = daemon.broker_link().cloned().unwrap();
        let cloud = daemon.cloud_link().cloned().unwrap();
        assert!(broker.inject("control/fan", "on"));
        tokio::time::sleep(Duration::from_millis(80)).await;

        let control = daemon.control_state().cloned().unwrap();
        assert_eq!(control.read().await.manual_fan, ControlMode::On);

        daemon.shutdown();
        daemon.join().await.unwrap();

        let published = broker.published();
        assert_eq!(published.first().map(|m| m.payload.as_str()), Some("online"));
        assert!(published.first().map(|m| m.retain).unwrap_or(false));
        assert_eq!(published.last().map(|m| m.payload.as_str()), Some("offline"));
        // With the fan forced on, status telemetry reports it on
        assert!(published
            .iter()
            .any(|m| m.topic == "status/fan" && m.payload == "on"));
        assert!(!cloud.history().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_channels_are_not_started() {
        let mut config = fast_config();
        config.broker.enabled = false;
        config.cloud.enabled = false;
        config.chat.enabled = false;

        let mut daemon = Daemon::new();
        daemon.launch(&config).await.unwrap();
        assert!(daemon.broker_link().is_none());
        assert!(daemon.cloud_link().is_none());
        assert!(daemon.chat_link().is_none());

        tokio::time::sleep(Duration::from_millis(60)).await;
        daemon.shutdown();
        daemon.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_chat_status_round_trip() {
        let mut daemon = Daemon::new();
        daemon.launch(&fast_config()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let chat = daemon.chat_link().cloned().unwrap();
        assert!(chat.inject("status"));
        tokio::time::sleep(Duration::from_millis(80)).await;

        daemon.shutdown();
        daemon.join().await.unwrap();

        let replies = chat.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("Temperature:"));
        assert!(replies[0].contains("Threshold: 27.5"));
    }
}
