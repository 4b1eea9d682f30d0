//! The narrow slice of the Discord API the anti-spam pipeline needs, behind a trait so the
//! pipeline can be driven without a gateway connection.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};

use crate::dispatch::message_info::MsgInfo;

pub mod discord;
#[cfg(test)]
pub mod mock;

/// Failures reported by the platform, already sorted by what the caller can do about them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The target no longer exists.
    #[error("not found")]
    NotFound,
    /// The bot lacks a permission for the action.
    #[error("missing permissions: {0}")]
    Forbidden(String),
    /// The platform asked us to slow down.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Server-provided delay, if any.
        retry_after: Option<Duration>,
    },
    /// Anything else, including transport failures.
    #[error("{0}")]
    Other(String),
}

/// Result of a single delete attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The message was deleted.
    Success,
    /// The message was already deleted.
    AlreadyGone,
    /// The bot isn't allowed to delete the message.
    Forbidden,
    /// Rate limited; may be retried after the given delay.
    Transient(Option<Duration>),
    /// Unrecoverable for this job.
    Fatal,
}

impl From<Result<(), PlatformError>> for DeleteOutcome {
    fn from(r: Result<(), PlatformError>) -> Self {
        match r {
            Ok(()) => DeleteOutcome::Success,
            Err(PlatformError::NotFound) => DeleteOutcome::AlreadyGone,
            Err(PlatformError::Forbidden(_)) => DeleteOutcome::Forbidden,
            Err(PlatformError::RateLimited { retry_after }) => DeleteOutcome::Transient(retry_after),
            Err(PlatformError::Other(_)) => DeleteOutcome::Fatal,
        }
    }
}

/// A text channel the bot can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChannel {
    pub id: ChannelId,
    pub name: String,
}

/// A message pulled from channel history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricMessage {
    pub info: MsgInfo,
    pub channel_name: String,
    pub content: String,
    pub attachments: usize,
}

/// Discord operations used by moderation.
#[async_trait::async_trait]
pub trait Platform: Send + Sync {
    /// Lists the text channels of a guild.
    async fn text_channels(&self, guild: GuildId) -> Result<Vec<TextChannel>, PlatformError>;

    /// Fetches every message in `channel` sent at or after `since`.
    async fn history_since(&self, channel: &TextChannel, since: DateTime<Utc>) -> Result<Vec<HistoricMessage>, PlatformError>;

    /// Deletes a single message.
    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<(), PlatformError>;

    /// Sends a message to a channel.
    async fn send(&self, channel: ChannelId, content: String) -> Result<MessageId, PlatformError>;

    /// Sends a message which removes itself after `ttl`. Returns once the message is sent.
    async fn send_transient(&self, channel: ChannelId, content: String, ttl: Duration) -> Result<(), PlatformError>;

    /// Times out a member until `until`.
    async fn timeout(&self, guild: GuildId, user: UserId, until: DateTime<Utc>, reason: &str) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_results_classify_by_kind() {
        assert_eq!(DeleteOutcome::from(Ok(())), DeleteOutcome::Success);
        assert_eq!(DeleteOutcome::from(Err(PlatformError::NotFound)), DeleteOutcome::AlreadyGone);
        assert_eq!(DeleteOutcome::from(Err(PlatformError::Forbidden("x".into()))), DeleteOutcome::Forbidden);
        assert_eq!(
            DeleteOutcome::from(Err(PlatformError::RateLimited { retry_after: Some(Duration::from_secs(3)) })),
            DeleteOutcome::Transient(Some(Duration::from_secs(3)))
        );
        assert_eq!(DeleteOutcome::from(Err(PlatformError::Other("boom".into()))), DeleteOutcome::Fatal);
    }
}
