// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Chat-bot collaborator
//!
//! The chat channel accepts the same overrides as the broker, plus a
//! `status` query answered from the latest sample. Commands may carry a
//! leading slash; tokens are case-insensitive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use tokio::sync::mpsc;
use tokio::time;

use crate::control::{
    apply_command, parse_threshold, ControlCommand, ControlMode, SharedControlState,
};
use crate::sampling::SharedLatestSample;

const USAGE: &str =
    "Commands:\nstatus\nfan on|off|auto\nbuzzer on|off|auto\nthreshold <value>";

/// One inbound chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub text: String,
}

/// Two-way chat connection. Owned by the handler task; replies go back
/// through the same transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Wait for the next inbound command.
    ///
    /// Returns `None` once the connection is closed for good.
    async fn next_command(&mut self) -> Option<ChatRequest>;

    /// Send a reply to the chat peer.
    async fn reply(&self, text: &str) -> Result<()>;
}

/// Test and integration handle onto the in-process chat connection.
#[derive(Clone)]
pub struct ChatLink {
    inbound: mpsc::UnboundedSender<ChatRequest>,
    replies: Arc<Mutex<Vec<String>>>,
}

impl ChatLink {
    /// Deliver an inbound chat message.
    pub fn inject(&self, text: &str) -> bool {
        self.inbound
            .send(ChatRequest {
                text: text.to_string(),
            })
            .is_ok()
    }

    /// Every reply sent so far, in order.
    pub fn replies(&self) -> Vec<String> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

struct ChannelChatTransport {
    inbound: mpsc::UnboundedReceiver<ChatRequest>,
    replies: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChatTransport for ChannelChatTransport {
    async fn next_command(&mut self) -> Option<ChatRequest> {
        self.inbound.recv().await
    }

    async fn reply(&self, text: &str) -> Result<()> {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }
}

/// Build an in-process chat connection.
pub fn connect_in_process() -> (Box<dyn ChatTransport>, ChatLink) {
    let (tx, rx) = mpsc::unbounded_channel();
    let replies = Arc::new(Mutex::new(Vec::new()));
    let link = ChatLink {
        inbound: tx,
        replies: replies.clone(),
    };
    (
        Box::new(ChannelChatTransport {
            inbound: rx,
            replies,
        }),
        link,
    )
}

/// Handler task body: answer chat commands until shutdown.
pub async fn run_handler(
    mut transport: Box<dyn ChatTransport>,
    state: SharedControlState,
    latest: SharedLatestSample,
    running: Arc<AtomicBool>,
) -> Result<()> {
    info!("chat handler started");
    while running.load(Ordering::SeqCst) {
        match time::timeout(Duration::from_millis(250), transport.next_command()).await {
            Ok(Some(request)) => {
                handle_request(transport.as_ref(), &state, &latest, &request.text).await?;
            }
            Ok(None) => {
                info!("chat connection closed");
                break;
            }
            Err(_) => {}
        }
    }
    info!("chat handler stopped");
    Ok(())
}

async fn handle_request(
    transport: &dyn ChatTransport,
    state: &SharedControlState,
    latest: &SharedLatestSample,
    text: &str,
) -> Result<()> {
    let trimmed = text.trim();
    let mut parts = trimmed.trim_start_matches('/').split_whitespace();
    let command = parts.next().map(|s| s.to_ascii_lowercase());

    match command.as_deref() {
        None | Some("start") | Some("help") => transport.reply(USAGE).await,
        Some("status") => {
            let reply = format_status(state, latest).await;
            transport.reply(&reply).await
        }
        Some("fan") => match parts.next().map(ControlMode::parse) {
            Some(Ok(mode)) => {
                apply_command(state, ControlCommand::Fan(mode), "chat").await;
                transport.reply(&mode_reply("Fan", mode)).await
            }
            Some(Err(e)) => transport.reply(&format!("{}", e)).await,
            None => transport.reply("Usage: fan on|off|auto").await,
        },
        Some("buzzer") => match parts.next().map(ControlMode::parse) {
            Some(Ok(mode)) => {
                apply_command(state, ControlCommand::Buzzer(mode), "chat").await;
                transport.reply(&mode_reply("Buzzer", mode)).await
            }
            Some(Err(e)) => transport.reply(&format!("{}", e)).await,
            None => transport.reply("Usage: buzzer on|off|auto").await,
        },
        Some("threshold") => match parts.next().map(parse_threshold) {
            Some(Ok(value)) => {
                apply_command(state, ControlCommand::Threshold(value), "chat").await;
                transport
                    .reply(&format!("Threshold set to {} \u{00b0}C", value))
                    .await
            }
            Some(Err(e)) => transport.reply(&format!("{}", e)).await,
            None => transport.reply("Usage: threshold <value>").await,
        },
        Some(other) => {
            transport
                .reply(&format!("Unknown command '{}'.\n{}", other, USAGE))
                .await
        }
    }
}

fn mode_reply(channel: &str, mode: ControlMode) -> String {
    format!("{} set to {}", channel, mode.describe())
}

async fn format_status(state: &SharedControlState, latest: &SharedLatestSample) -> String {
    let snapshot = state.read().await.clone();
    let sample = latest.read().await.clone();
    let mut lines = Vec::new();
    match sample {
        Some(sample) => {
            lines.push(format!(
                "Temperature: {:.2} \u{00b0}C",
                sample.reading.temperature
            ));
            lines.push(format!("Humidity: {:.2} %", sample.reading.humidity));
        }
        None => lines.push("No sensor reading yet".to_string()),
    }
    lines.push(format!("Fan: {}", snapshot.manual_fan.describe()));
    lines.push(format!("Buzzer: {}", snapshot.manual_buzzer.describe()));
    lines.push(format!("Threshold: {} \u{00b0}C", snapshot.threshold));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::create_shared_control_state;
    use crate::sampling::create_shared_latest_sample;

    async fn exercise(commands: &[&str]) -> (SharedControlState, Vec<String>) {
        let (transport, link) = connect_in_process();
        let state = create_shared_control_state(27.5);
        let latest = create_shared_latest_sample();
        let running = Arc::new(AtomicBool::new(true));

        let handle = tokio::spawn(run_handler(
            transport,
            state.clone(),
            latest,
            running.clone(),
        ));
        for command in commands {
            assert!(link.inject(command));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        running.store(false, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        (state, link.replies())
    }

    #[tokio::test]
    async fn test_fan_command_with_slash_prefix() {
        let (state, replies) = exercise(&["/fan ON"]).await;
        assert_eq!(state.read().await.manual_fan, ControlMode::On);
        assert_eq!(replies, vec!["Fan set to Manual ON".to_string()]);
    }

    #[tokio::test]
    async fn test_buzzer_back_to_auto() {
        let (state, replies) = exercise(&["buzzer on", "buzzer auto"]).await;
        assert_eq!(state.read().await.manual_buzzer, ControlMode::Auto);
        assert_eq!(replies.last().map(String::as_str), Some("Buzzer set to Auto"));
    }

    #[tokio::test]
    async fn test_threshold_command() {
        let (state, replies) = exercise(&["threshold 29.5"]).await;
        assert_eq!(state.read().await.threshold, 29.5);
        assert_eq!(
            replies,
            vec!["Threshold set to 29.5 \u{00b0}C".to_string()]
        );
    }

    #[tokio::test]
    async fn test_invalid_argument_gets_error_and_no_change() {
        let (state, replies) = exercise(&["fan sideways"]).await;
        assert_eq!(state.read().await.manual_fan, ControlMode::Auto);
        assert!(replies[0].contains("unrecognized mode"));
    }

    #[tokio::test]
    async fn test_missing_argument_gets_usage() {
        let (_, replies) = exercise(&["threshold"]).await;
        assert_eq!(replies, vec!["Usage: threshold <value>".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_command_gets_usage() {
        let (_, replies) = exercise(&["open_oven"]).await;
        assert!(replies[0].starts_with("Unknown command 'open_oven'"));
        assert!(replies[0].contains("threshold <value>"));
    }

    #[tokio::test]
    async fn test_status_without_sample() {
        let (_, replies) = exercise(&["status"]).await;
        assert!(replies[0].contains("No sensor reading yet"));
        assert!(replies[0].contains("Fan: Auto"));
        assert!(replies[0].contains("Threshold: 27.5"));
    }
}
