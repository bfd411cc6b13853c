// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Message-broker collaborator
//!
//! The broker carries telemetry outbound (sensor readings, actuator status,
//! uptime, availability) and control tokens inbound (fan/buzzer mode,
//! threshold updates). Topic names come from [`BrokerConfig`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time;

use crate::config::BrokerConfig;
use crate::control::{
    apply_command, parse_threshold, ControlCommand, ControlMode, SharedControlState,
};

/// A single outbound broker message.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Outbound half of the broker connection. Shared between tasks.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()>;
}

/// Inbound half of the broker connection. Owned by the listener task.
#[async_trait]
pub trait BrokerSubscriber: Send {
    /// Wait for the next inbound `(topic, payload)` pair.
    ///
    /// Returns `None` once the subscription is closed for good.
    async fn next_message(&mut self) -> Option<(String, String)>;
}

/// Test and integration handle onto the in-process broker.
///
/// Messages injected here are delivered to the listener task; everything the
/// controller publishes is recorded and can be inspected with
/// [`BrokerLink::published`].
#[derive(Clone)]
pub struct BrokerLink {
    inbound: mpsc::UnboundedSender<(String, String)>,
    published: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl BrokerLink {
    /// Deliver an inbound message as if the broker had routed it to us.
    pub fn inject(&self, topic: &str, payload: &str) -> bool {
        self.inbound
            .send((topic.to_string(), payload.to_string()))
            .is_ok()
    }

    /// Snapshot of every message published so far, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

struct ChannelBrokerPublisher {
    published: Arc<Mutex<Vec<PublishedMessage>>>,
}

#[async_trait]
impl BrokerPublisher for ChannelBrokerPublisher {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        debug!("broker publish {} <- {:?} (retain={})", topic, payload, retain);
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage {
                topic: topic.to_string(),
                payload: payload.to_string(),
                retain,
            });
        Ok(())
    }
}

struct ChannelBrokerSubscriber {
    inbound: mpsc::UnboundedReceiver<(String, String)>,
}

#[async_trait]
impl BrokerSubscriber for ChannelBrokerSubscriber {
    async fn next_message(&mut self) -> Option<(String, String)> {
        self.inbound.recv().await
    }
}

/// Build an in-process broker connection.
///
/// Returns the shared publisher, the subscriber for the listener task, and
/// the [`BrokerLink`] used to drive the pair from outside.
pub fn connect_in_process() -> (Arc<dyn BrokerPublisher>, Box<dyn BrokerSubscriber>, BrokerLink) {
    let (tx, rx) = mpsc::unbounded_channel();
    let published = Arc::new(Mutex::new(Vec::new()));
    let link = BrokerLink {
        inbound: tx,
        published: published.clone(),
    };
    (
        Arc::new(ChannelBrokerPublisher { published }),
        Box::new(ChannelBrokerSubscriber { inbound: rx }),
        link,
    )
}

/// Listener task body: route inbound control messages until shutdown.
pub async fn run_listener(
    mut subscriber: Box<dyn BrokerSubscriber>,
    config: BrokerConfig,
    state: SharedControlState,
    running: Arc<AtomicBool>,
) -> Result<()> {
    info!("broker listener started");
    while running.load(Ordering::SeqCst) {
        match time::timeout(Duration::from_millis(250), subscriber.next_message()).await {
            Ok(Some((topic, payload))) => {
                handle_message(&config, &state, &topic, &payload).await;
            }
            Ok(None) => {
                info!("broker subscription closed");
                break;
            }
            // Timeout: loop around and re-check the running flag
            Err(_) => {}
        }
    }
    info!("broker listener stopped");
    Ok(())
}

/// Apply one inbound broker message to the control state.
///
/// Unknown topics are ignored; invalid payloads are logged and dropped
/// without touching the state.
pub(crate) async fn handle_message(
    config: &BrokerConfig,
    state: &SharedControlState,
    topic: &str,
    payload: &str,
) {
    if topic == config.fan_topic {
        match ControlMode::parse(payload) {
            Ok(mode) => apply_command(state, ControlCommand::Fan(mode), "broker").await,
            Err(e) => warn!("broker: rejected fan command: {}", e),
        }
    } else if topic == config.buzzer_topic {
        match ControlMode::parse(payload) {
            Ok(mode) => apply_command(state, ControlCommand::Buzzer(mode), "broker").await,
            Err(e) => warn!("broker: rejected buzzer command: {}", e),
        }
    } else if topic == config.threshold_topic {
        match parse_threshold(payload) {
            Ok(value) => apply_command(state, ControlCommand::Threshold(value), "broker").await,
            Err(e) => warn!("broker: rejected threshold update: {}", e),
        }
    } else {
        debug!("broker: ignoring message on {}", topic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::create_shared_control_state;

    #[tokio::test]
    async fn test_fan_command_routes_to_state() {
        let config = BrokerConfig::default();
        let state = create_shared_control_state(27.5);

        handle_message(&config, &state, "control/fan", "ON").await;
        assert_eq!(state.read().await.manual_fan, ControlMode::On);

        handle_message(&config, &state, "control/fan", "auto").await;
        assert_eq!(state.read().await.manual_fan, ControlMode::Auto);
    }

    #[tokio::test]
    async fn test_invalid_payload_leaves_state_unchanged() {
        let config = BrokerConfig::default();
        let state = create_shared_control_state(27.5);

        handle_message(&config, &state, "control/buzzer", "on").await;
        handle_message(&config, &state, "control/buzzer", "banana").await;
        assert_eq!(state.read().await.manual_buzzer, ControlMode::On);

        handle_message(&config, &state, "config/threshold", "NaN").await;
        assert_eq!(state.read().await.threshold, 27.5);
    }

    #[tokio::test]
    async fn test_threshold_update() {
        let config = BrokerConfig::default();
        let state = create_shared_control_state(27.5);

        handle_message(&config, &state, "config/threshold", "30.25").await;
        assert_eq!(state.read().await.threshold, 30.25);
    }

    #[tokio::test]
    async fn test_unknown_topic_is_ignored() {
        let config = BrokerConfig::default();
        let state = create_shared_control_state(27.5);

        handle_message(&config, &state, "some/other/topic", "on").await;
        let snapshot = state.read().await.clone();
        assert_eq!(snapshot.manual_fan, ControlMode::Auto);
        assert_eq!(snapshot.manual_buzzer, ControlMode::Auto);
    }

    #[tokio::test]
    async fn test_listener_end_to_end_with_shutdown() {
        let (publisher, subscriber, link) = connect_in_process();
        let state = create_shared_control_state(27.5);
        let running = Arc::new(AtomicBool::new(true));

        let handle = tokio::spawn(run_listener(
            subscriber,
            BrokerConfig::default(),
            state.clone(),
            running.clone(),
        ));

        assert!(link.inject("control/fan", "off"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.read().await.manual_fan, ControlMode::Off);

        running.store(false, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // Publisher side still records messages after the listener stopped
        publisher.publish("status/fan", "off", false).await.unwrap();
        let published = link.published();
        assert_eq!(
            published,
            vec![PublishedMessage {
                topic: "status/fan".to_string(),
                payload: "off".to_string(),
                retain: false,
            }]
        );
    }
}
