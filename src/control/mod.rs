// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Shared control state for the bakery climate controller
//!
//! This module provides the thread-safe control record that every remote
//! command source writes into and that the sample loop and indicator driver
//! read on each tick. It also owns the validation contract for inbound
//! control tokens: mode tokens (`on`/`off`/`auto`) and decimal thresholds
//! are checked here, before any mutation is committed.

pub mod policy;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Manual override state for a single actuator channel.
///
/// `Auto` means the threshold policy decides; `On`/`Off` force the actuator
/// regardless of the sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Policy-derived: the actuator follows the temperature threshold
    Auto,
    /// Manually forced on
    On,
    /// Manually forced off
    Off,
}

/// Validation error for inbound control tokens.
///
/// Raised at the boundary, before any state mutation; the previous state is
/// always retained when one of these is returned.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unrecognized mode '{0}', expected on, off or auto")]
    UnknownMode(String),
    #[error("invalid threshold '{0}', expected a finite decimal number")]
    InvalidThreshold(String),
}

impl ControlMode {
    /// Parse a raw control token, case-insensitively.
    ///
    /// An empty token means `Auto` (absence of an override). Anything other
    /// than `on`, `off` or `auto` is rejected.
    pub fn parse(token: &str) -> Result<Self, CommandError> {
        match token.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(ControlMode::On),
            "off" => Ok(ControlMode::Off),
            "auto" | "" => Ok(ControlMode::Auto),
            _ => Err(CommandError::UnknownMode(token.to_string())),
        }
    }

    /// Forced output level, or `None` in auto mode.
    pub fn level(&self) -> Option<bool> {
        match self {
            ControlMode::Auto => None,
            ControlMode::On => Some(true),
            ControlMode::Off => Some(false),
        }
    }

    /// Wire representation used on status topics.
    pub fn as_token(&self) -> &'static str {
        match self {
            ControlMode::Auto => "auto",
            ControlMode::On => "on",
            ControlMode::Off => "off",
        }
    }

    /// Human-readable form used in chat replies.
    pub fn describe(&self) -> &'static str {
        match self {
            ControlMode::Auto => "Auto",
            ControlMode::On => "Manual ON",
            ControlMode::Off => "Manual OFF",
        }
    }
}

/// Parse a threshold token into a finite temperature value.
pub fn parse_threshold(token: &str) -> Result<f64, CommandError> {
    let value: f64 = token
        .trim()
        .parse()
        .map_err(|_| CommandError::InvalidThreshold(token.to_string()))?;
    if !value.is_finite() {
        return Err(CommandError::InvalidThreshold(token.to_string()));
    }
    Ok(value)
}

/// A validated mutation of the control state.
///
/// Commands are only constructed from tokens that already passed validation,
/// so applying one can never leave the state partially updated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    Fan(ControlMode),
    Buzzer(ControlMode),
    /// Both flags at once, as delivered by structured cloud change records
    Overrides {
        fan: ControlMode,
        buzzer: ControlMode,
    },
    Threshold(f64),
}

/// The shared control record read by the sample loop and indicator driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    pub manual_fan: ControlMode,
    pub manual_buzzer: ControlMode,
    /// Auto-mode temperature threshold, always finite
    pub threshold: f64,
}

impl ControlState {
    /// Create a control state with both channels in auto mode.
    pub fn new(threshold: f64) -> Self {
        Self {
            manual_fan: ControlMode::Auto,
            manual_buzzer: ControlMode::Auto,
            threshold,
        }
    }

    /// Apply a validated command. Each command mutates its fields in one
    /// step, so readers holding a snapshot never observe a torn update.
    pub fn apply(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Fan(mode) => self.manual_fan = mode,
            ControlCommand::Buzzer(mode) => self.manual_buzzer = mode,
            ControlCommand::Overrides { fan, buzzer } => {
                self.manual_fan = fan;
                self.manual_buzzer = buzzer;
            }
            ControlCommand::Threshold(value) => self.threshold = value,
        }
    }
}

/// Type alias for the control state shared across tasks.
pub type SharedControlState = Arc<RwLock<ControlState>>;

/// Create a new shared control state instance.
pub fn create_shared_control_state(threshold: f64) -> SharedControlState {
    Arc::new(RwLock::new(ControlState::new(threshold)))
}

/// Commit a validated command to the shared state and log the mutation with
/// its originating source.
pub async fn apply_command(state: &SharedControlState, command: ControlCommand, source: &str) {
    let mut guard = state.write().await;
    guard.apply(command);
    log::info!(
        "{} applied {:?}: fan={}, buzzer={}, threshold={}",
        source,
        command,
        guard.manual_fan.as_token(),
        guard.manual_buzzer.as_token(),
        guard.threshold
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_token_parsing_case_insensitive() {
        for token in ["ON", "on", "On", " on "] {
            assert_eq!(ControlMode::parse(token).unwrap(), ControlMode::On);
        }
        assert_eq!(ControlMode::parse("OFF").unwrap(), ControlMode::Off);
        assert_eq!(ControlMode::parse("Auto").unwrap(), ControlMode::Auto);
        // Absence of a token means auto
        assert_eq!(ControlMode::parse("").unwrap(), ControlMode::Auto);
    }

    #[test]
    fn test_mode_token_rejection() {
        let err = ControlMode::parse("banana").unwrap_err();
        assert_eq!(err, CommandError::UnknownMode("banana".to_string()));
    }

    #[test]
    fn test_threshold_parsing() {
        assert_eq!(parse_threshold("27.5").unwrap(), 27.5);
        assert_eq!(parse_threshold(" 30 ").unwrap(), 30.0);
        assert!(matches!(
            parse_threshold("abc"),
            Err(CommandError::InvalidThreshold(_))
        ));
        assert!(matches!(
            parse_threshold("NaN"),
            Err(CommandError::InvalidThreshold(_))
        ));
        assert!(matches!(
            parse_threshold("inf"),
            Err(CommandError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_rejected_token_leaves_state_unchanged() {
        let mut state = ControlState::new(27.5);
        state.apply(ControlCommand::Fan(ControlMode::On));

        // Parsing fails before a command exists, so nothing reaches apply()
        assert!(ControlMode::parse("banana").is_err());
        assert!(parse_threshold("abc").is_err());

        assert_eq!(state.manual_fan, ControlMode::On);
        assert_eq!(state.threshold, 27.5);
    }

    #[test]
    fn test_structured_override_applies_both_flags() {
        let mut state = ControlState::new(27.5);
        state.apply(ControlCommand::Overrides {
            fan: ControlMode::On,
            buzzer: ControlMode::Off,
        });
        assert_eq!(state.manual_fan, ControlMode::On);
        assert_eq!(state.manual_buzzer, ControlMode::Off);
        assert_eq!(state.threshold, 27.5);
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_corrupt_state() {
        let shared = create_shared_control_state(27.5);

        let mut handles = vec![];
        for i in 0..30u32 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                let command = match i % 3 {
                    0 => ControlCommand::Fan(if i % 2 == 0 {
                        ControlMode::On
                    } else {
                        ControlMode::Off
                    }),
                    1 => ControlCommand::Buzzer(ControlMode::On),
                    _ => ControlCommand::Threshold(20.0 + f64::from(i)),
                };
                shared.write().await.apply(command);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Each field holds one of the written values, never a torn mix
        let state = shared.read().await.clone();
        assert!(matches!(
            state.manual_fan,
            ControlMode::On | ControlMode::Off
        ));
        assert_eq!(state.manual_buzzer, ControlMode::On);
        assert!(state.threshold.is_finite());
        assert!(state.threshold >= 20.0 && state.threshold < 51.0);
    }

    #[tokio::test]
    async fn test_apply_command_last_write_wins() {
        let shared = create_shared_control_state(27.5);
        apply_command(&shared, ControlCommand::Fan(ControlMode::On), "broker").await;
        apply_command(&shared, ControlCommand::Fan(ControlMode::Auto), "chat").await;
        assert_eq!(shared.read().await.manual_fan, ControlMode::Auto);
    }
}
