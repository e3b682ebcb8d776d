//! Messaging channel contract.
//!
//! Outbound: text messages with optional buttons. Inbound: commands,
//! free-text replies and button presses, normalized into [`Inbound`].

use std::str::FromStr;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Button, UserId};

/// Transport used to reach users.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Deliver a message. An empty `buttons` slice sends plain text.
    async fn send(&self, recipient: UserId, text: &str, buttons: &[Button]) -> Result<()>;

    /// Confirm a button press, optionally with a short notice.
    async fn acknowledge(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
        Ok(())
    }
}

/// Producer of inbound interactions, read in batches.
#[async_trait]
pub trait InboundSource: Send + Sync {
    /// Wait for the next batch; an empty batch is a normal outcome.
    async fn next_batch(&self) -> Result<Vec<Inbound>>;
}

/// Slash commands understood by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Search,
    MySearches,
    Help,
}

impl FromStr for Command {
    type Err = AppError;

    /// Accepts `/name`, `/name@botname` and trailing arguments.
    fn from_str(s: &str) -> Result<Self> {
        let word = s
            .split_whitespace()
            .next()
            .and_then(|w| w.strip_prefix('/'))
            .ok_or_else(|| AppError::malformed(format!("not a command: '{s}'")))?;
        let name = word.split('@').next().unwrap_or(word);

        match name.to_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "search" => Ok(Command::Search),
            "mysearches" => Ok(Command::MySearches),
            "help" => Ok(Command::Help),
            other => Err(AppError::malformed(format!("unknown command '/{other}'"))),
        }
    }
}

/// What a user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    Command(Command),
    Text(String),
    /// Raw callback payload of a pressed button
    Action {
        data: String,
        callback_id: Option<String>,
    },
}

/// One inbound interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user_id: UserId,
    pub kind: InboundKind,
}

impl Inbound {
    /// Classify a text message: known slash commands become commands,
    /// everything else is a free-text reply.
    pub fn from_text(user_id: UserId, text: &str) -> Self {
        let kind = match text.trim_start().parse() {
            Ok(command) => InboundKind::Command(command),
            Err(_) => InboundKind::Text(text.to_string()),
        };
        Self { user_id, kind }
    }

    pub fn action(user_id: UserId, data: impl Into<String>, callback_id: Option<String>) -> Self {
        Self {
            user_id,
            kind: InboundKind::Action {
                data: data.into(),
                callback_id,
            },
        }
    }
}
