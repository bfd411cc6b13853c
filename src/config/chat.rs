// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Chat-bot command channel settings

use serde::{Deserialize, Serialize};

/// Configuration for the chat-command collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Enable or disable the chat command channel
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}
