//! [`Platform`] implementation over serenity's HTTP client.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serenity::builder::{EditMember, GetMessages};
use serenity::http::{Http, HttpError};
use serenity::model::channel::ChannelType;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use serenity::model::{ModelError, Timestamp};

use crate::dispatch::message_info::MsgInfo;
use crate::platform::{HistoricMessage, Platform, PlatformError, TextChannel};

/// Milliseconds between the unix epoch and the Discord epoch (2015-01-01).
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;
/// Most messages Discord will hand back per history request.
pub const HISTORY_PAGE_SIZE: u8 = 100;

/// Talks to Discord through a shared serenity [`Http`] client.
#[derive(Clone)]
pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

/// The smallest message snowflake that could have been created at `at`.
pub fn snowflake_at(at: DateTime<Utc>) -> MessageId {
    let ms = (at.timestamp_millis() - DISCORD_EPOCH_MS).max(1) as u64;
    MessageId::new(ms << 22)
}

fn classify_http(e: &HttpError) -> PlatformError {
    match e {
        HttpError::UnsuccessfulRequest(resp) => match resp.status_code.as_u16() {
            403 => PlatformError::Forbidden(resp.error.message.clone()),
            404 => PlatformError::NotFound,
            429 => PlatformError::RateLimited { retry_after: None },
            _ => PlatformError::Other(resp.error.message.clone()),
        },
        e => PlatformError::Other(e.to_string()),
    }
}

impl From<serenity::Error> for PlatformError {
    fn from(e: serenity::Error) -> Self {
        match e {
            serenity::Error::Http(ref h) => classify_http(h),
            serenity::Error::Model(me @ ModelError::InvalidPermissions { .. }) => {
                PlatformError::Forbidden(me.to_string())
            }
            e => PlatformError::Other(e.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl Platform for DiscordPlatform {
    async fn text_channels(&self, guild: GuildId) -> Result<Vec<TextChannel>, PlatformError> {
        let mut channels: Vec<_> = guild
            .channels(&*self.http)
            .await?
            .into_values()
            .filter(|c| matches!(c.kind, ChannelType::Text | ChannelType::News))
            .collect();
        channels.sort_by_key(|c| c.position);

        Ok(channels
            .into_iter()
            .map(|c| TextChannel { id: c.id, name: c.name })
            .collect())
    }

    #[instrument(level = "debug", skip(self, channel), fields(channel = %channel.id))]
    async fn history_since(&self, channel: &TextChannel, since: DateTime<Utc>) -> Result<Vec<HistoricMessage>, PlatformError> {
        let mut after = snowflake_at(since);
        let mut out = Vec::new();

        loop {
            let page = channel
                .id
                .messages(&*self.http, GetMessages::new().after(after).limit(HISTORY_PAGE_SIZE))
                .await?;
            let page_len = page.len();
            if let Some(newest) = page.iter().map(|m| m.id).max() {
                after = newest;
            }

            out.extend(page.into_iter().map(|m| HistoricMessage {
                channel_name: channel.name.clone(),
                content: m.content.clone(),
                attachments: m.attachments.len(),
                info: MsgInfo::from(m),
            }));

            if page_len < HISTORY_PAGE_SIZE as usize {
                break;
            }
        }

        trace!("fetched {} messages", out.len());
        Ok(out)
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<(), PlatformError> {
        channel.delete_message(&*self.http, message).await?;
        Ok(())
    }

    async fn send(&self, channel: ChannelId, content: String) -> Result<MessageId, PlatformError> {
        let m = channel.say(&*self.http, content).await?;
        Ok(m.id)
    }

    async fn send_transient(&self, channel: ChannelId, content: String, ttl: Duration) -> Result<(), PlatformError> {
        let id = self.send(channel, content).await?;
        let http = self.http.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Err(e) = channel.delete_message(&*http, id).await {
                debug!("couldn't remove transient message {}: {}", id, e);
            }
        });
        Ok(())
    }

    async fn timeout(&self, guild: GuildId, user: UserId, until: DateTime<Utc>, reason: &str) -> Result<(), PlatformError> {
        let until = Timestamp::from_unix_timestamp(until.timestamp())
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        guild
            .edit_member(
                &*self.http,
                user,
                EditMember::new()
                    .disable_communication_until_datetime(until)
                    .audit_log_reason(reason),
            )
            .await?;
        Ok(())
    }
}
