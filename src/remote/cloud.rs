// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Cloud database collaborator
//!
//! The cloud side keeps two outbound records (an append-only history of
//! timestamped samples and a live status document) and one inbound watch on
//! the control document, from which manual overrides arrive as change events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time;

use crate::config::CloudConfig;
use crate::control::{apply_command, ControlCommand, ControlMode, SharedControlState};

/// One append-only history entry: sensor reading plus the decision taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub fan_on: bool,
    pub buzzer_on: bool,
}

/// The live status document, overwritten on every sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub fan: String,
    pub buzzer: String,
    pub threshold: f64,
    pub uptime_seconds: u64,
}

/// A change event observed on the watched control document.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudControlEvent {
    /// Path of the change, relative to the watched document ("fan",
    /// "buzzer", or "/" for a whole-document write)
    pub path: String,
    pub data: CloudControlData,
}

/// Payload of a control change: either a bare token written to one field,
/// or a structured record replacing the whole document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CloudControlData {
    Value(String),
    Record(CloudOverrideRecord),
}

/// Whole-document override record. Missing fields fall back to auto.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudOverrideRecord {
    #[serde(default = "default_auto")]
    pub fan: String,
    #[serde(default = "default_auto")]
    pub buzzer: String,
}

fn default_auto() -> String {
    "auto".to_string()
}

/// Outbound half of the cloud connection. Shared between tasks.
#[async_trait]
pub trait CloudWriter: Send + Sync {
    async fn write_history(&self, record: &HistoryRecord) -> Result<()>;
    async fn write_status(&self, record: &StatusRecord) -> Result<()>;
}

/// Inbound half of the cloud connection. Owned by the listener task.
#[async_trait]
pub trait CloudSubscriber: Send {
    /// Wait for the next change event on the control document.
    ///
    /// Returns `None` once the watch is closed for good.
    async fn next_change(&mut self) -> Option<CloudControlEvent>;
}

/// Test and integration handle onto the in-process cloud connection.
#[derive(Clone)]
pub struct CloudLink {
    inbound: mpsc::UnboundedSender<CloudControlEvent>,
    history: Arc<Mutex<Vec<HistoryRecord>>>,
    status: Arc<Mutex<Option<StatusRecord>>>,
}

impl CloudLink {
    /// Deliver a change event carrying a bare token for one field.
    pub fn inject_value(&self, path: &str, token: &str) -> bool {
        self.inbound
            .send(CloudControlEvent {
                path: path.to_string(),
                data: CloudControlData::Value(token.to_string()),
            })
            .is_ok()
    }

    /// Deliver a change event parsed from raw JSON, as a real watch would.
    pub fn inject_json(&self, path: &str, data: serde_json::Value) -> Result<bool> {
        let data: CloudControlData =
            serde_json::from_value(data).context("malformed control change payload")?;
        Ok(self
            .inbound
            .send(CloudControlEvent {
                path: path.to_string(),
                data,
            })
            .is_ok())
    }

    /// All history records written so far, in order.
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The most recently written status record, if any.
    pub fn status(&self) -> Option<StatusRecord> {
        self.status.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

struct ChannelCloudWriter {
    history: Arc<Mutex<Vec<HistoryRecord>>>,
    status: Arc<Mutex<Option<StatusRecord>>>,
    history_path: String,
    status_path: String,
}

#[async_trait]
impl CloudWriter for ChannelCloudWriter {
    async fn write_history(&self, record: &HistoryRecord) -> Result<()> {
        debug!("cloud push {} <- {:.2} C", self.history_path, record.temperature);
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }

    async fn write_status(&self, record: &StatusRecord) -> Result<()> {
        debug!("cloud set {}", self.status_path);
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = Some(record.clone());
        Ok(())
    }
}

struct ChannelCloudSubscriber {
    inbound: mpsc::UnboundedReceiver<CloudControlEvent>,
}

#[async_trait]
impl CloudSubscriber for ChannelCloudSubscriber {
    async fn next_change(&mut self) -> Option<CloudControlEvent> {
        self.inbound.recv().await
    }
}

/// Build an in-process cloud connection.
pub fn connect_in_process(
    config: &CloudConfig,
) -> (Arc<dyn CloudWriter>, Box<dyn CloudSubscriber>, CloudLink) {
    let (tx, rx) = mpsc::unbounded_channel();
    let history = Arc::new(Mutex::new(Vec::new()));
    let status = Arc::new(Mutex::new(None));
    let link = CloudLink {
        inbound: tx,
        history: history.clone(),
        status: status.clone(),
    };
    (
        Arc::new(ChannelCloudWriter {
            history,
            status,
            history_path: config.history_path.clone(),
            status_path: config.status_path.clone(),
        }),
        Box::new(ChannelCloudSubscriber { inbound: rx }),
        link,
    )
}

/// Listener task body: apply control-document changes until shutdown.
pub async fn run_listener(
    mut subscriber: Box<dyn CloudSubscriber>,
    state: SharedControlState,
    running: Arc<AtomicBool>,
) -> Result<()> {
    info!("cloud listener started");
    while running.load(Ordering::SeqCst) {
        match time::timeout(Duration::from_millis(250), subscriber.next_change()).await {
            Ok(Some(event)) => handle_change(&state, event).await,
            Ok(None) => {
                info!("cloud watch closed");
                break;
            }
            Err(_) => {}
        }
    }
    info!("cloud listener stopped");
    Ok(())
}

/// Apply one control-document change to the control state.
///
/// A bare token targets the field named by the event path. A structured
/// record replaces both overrides at once; if either field fails to parse
/// the whole event is dropped so the state is never half-applied.
pub(crate) async fn handle_change(state: &SharedControlState, event: CloudControlEvent) {
    match event.data {
        CloudControlData::Value(token) => match event.path.trim_matches('/') {
            "fan" => match ControlMode::parse(&token) {
                Ok(mode) => apply_command(state, ControlCommand::Fan(mode), "cloud").await,
                Err(e) => warn!("cloud: rejected fan change: {}", e),
            },
            "buzzer" => match ControlMode::parse(&token) {
                Ok(mode) => apply_command(state, ControlCommand::Buzzer(mode), "cloud").await,
                Err(e) => warn!("cloud: rejected buzzer change: {}", e),
            },
            other => debug!("cloud: ignoring change at '{}'", other),
        },
        CloudControlData::Record(record) => {
            let fan = ControlMode::parse(&record.fan);
            let buzzer = ControlMode::parse(&record.buzzer);
            match (fan, buzzer) {
                (Ok(fan), Ok(buzzer)) => {
                    apply_command(state, ControlCommand::Overrides { fan, buzzer }, "cloud").await;
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!("cloud: rejected override record: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::create_shared_control_state;
    use serde_json::json;

    fn value_event(path: &str, token: &str) -> CloudControlEvent {
        CloudControlEvent {
            path: path.to_string(),
            data: CloudControlData::Value(token.to_string()),
        }
    }

    #[tokio::test]
    async fn test_field_change_applies_single_override() {
        let state = create_shared_control_state(27.5);

        handle_change(&state, value_event("fan", "on")).await;
        let snapshot = state.read().await.clone();
        assert_eq!(snapshot.manual_fan, ControlMode::On);
        assert_eq!(snapshot.manual_buzzer, ControlMode::Auto);
    }

    #[tokio::test]
    async fn test_whole_document_write_replaces_both_overrides() {
        let state = create_shared_control_state(27.5);
        handle_change(&state, value_event("fan", "on")).await;

        let event: CloudControlData =
            serde_json::from_value(json!({"fan": "off", "buzzer": "on"})).unwrap();
        handle_change(
            &state,
            CloudControlEvent {
                path: "/".to_string(),
                data: event,
            },
        )
        .await;

        let snapshot = state.read().await.clone();
        assert_eq!(snapshot.manual_fan, ControlMode::Off);
        assert_eq!(snapshot.manual_buzzer, ControlMode::On);
    }

    #[tokio::test]
    async fn test_missing_record_fields_default_to_auto() {
        let state = create_shared_control_state(27.5);
        handle_change(&state, value_event("buzzer", "on")).await;

        let data: CloudControlData = serde_json::from_value(json!({"fan": "on"})).unwrap();
        handle_change(
            &state,
            CloudControlEvent {
                path: "/".to_string(),
                data,
            },
        )
        .await;

        let snapshot = state.read().await.clone();
        assert_eq!(snapshot.manual_fan, ControlMode::On);
        assert_eq!(snapshot.manual_buzzer, ControlMode::Auto);
    }

    #[tokio::test]
    async fn test_invalid_record_field_drops_whole_event() {
        let state = create_shared_control_state(27.5);
        handle_change(&state, value_event("fan", "on")).await;

        let data: CloudControlData =
            serde_json::from_value(json!({"fan": "maybe", "buzzer": "off"})).unwrap();
        handle_change(
            &state,
            CloudControlEvent {
                path: "/".to_string(),
                data,
            },
        )
        .await;

        // Nothing changed, not even the valid half
        let snapshot = state.read().await.clone();
        assert_eq!(snapshot.manual_fan, ControlMode::On);
        assert_eq!(snapshot.manual_buzzer, ControlMode::Auto);
    }

    #[tokio::test]
    async fn test_listener_end_to_end_with_shutdown() {
        let config = CloudConfig::default();
        let (writer, subscriber, link) = connect_in_process(&config);
        let state = create_shared_control_state(27.5);
        let running = Arc::new(AtomicBool::new(true));

        let handle = tokio::spawn(run_listener(subscriber, state.clone(), running.clone()));

        assert!(link.inject_json("/", json!({"fan": "on", "buzzer": "off"})).unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = state.read().await.clone();
        assert_eq!(snapshot.manual_fan, ControlMode::On);
        assert_eq!(snapshot.manual_buzzer, ControlMode::Off);

        running.store(false, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let record = StatusRecord {
            fan: "on".to_string(),
            buzzer: "off".to_string(),
            threshold: 27.5,
            uptime_seconds: 12,
        };
        writer.write_status(&record).await.unwrap();
        assert_eq!(link.status(), Some(record));
        assert!(link.history().is_empty());
    }
}
