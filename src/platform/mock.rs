//! Scripted [`Platform`] double for tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};

use crate::platform::{HistoricMessage, Platform, PlatformError, TextChannel};

/// Records every call and replays scripted results.
#[derive(Default)]
pub struct MockPlatform {
    pub channels: Mutex<Vec<TextChannel>>,
    pub history: Mutex<HashMap<ChannelId, Result<Vec<HistoricMessage>, PlatformError>>>,
    /// Per-message scripted delete results, consumed front to back. Unscripted deletes succeed.
    pub delete_script: Mutex<HashMap<MessageId, VecDeque<Result<(), PlatformError>>>>,
    pub timeout_result: Mutex<Option<PlatformError>>,
    /// Deleting this message panics.
    pub panic_on_delete: Mutex<Option<MessageId>>,

    pub deletes: Mutex<Vec<(ChannelId, MessageId)>>,
    pub sent: Mutex<Vec<(ChannelId, String)>>,
    pub transient: Mutex<Vec<(ChannelId, String, Duration)>>,
    pub timeouts: Mutex<Vec<(GuildId, UserId, DateTime<Utc>)>>,
}

impl MockPlatform {
    pub fn script_delete(&self, msg: MessageId, results: impl IntoIterator<Item = Result<(), PlatformError>>) {
        self.delete_script.lock().entry(msg).or_default().extend(results);
    }

    pub fn delete_attempts(&self, msg: MessageId) -> usize {
        self.deletes.lock().iter().filter(|(_, m)| *m == msg).count()
    }
}

#[async_trait::async_trait]
impl Platform for MockPlatform {
    async fn text_channels(&self, _guild: GuildId) -> Result<Vec<TextChannel>, PlatformError> {
        Ok(self.channels.lock().clone())
    }

    async fn history_since(&self, channel: &TextChannel, since: DateTime<Utc>) -> Result<Vec<HistoricMessage>, PlatformError> {
        match self.history.lock().get(&channel.id) {
            None => Ok(Vec::new()),
            Some(Err(e)) => Err(e.clone()),
            Some(Ok(msgs)) => Ok(msgs
                .iter()
                .filter(|m| m.info.timestamp >= since)
                .cloned()
                .collect()),
        }
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<(), PlatformError> {
        self.deletes.lock().push((channel, message));
        let explode = *self.panic_on_delete.lock() == Some(message);
        if explode {
            panic!("scripted panic deleting {}", message);
        }
        self.delete_script
            .lock()
            .get_mut(&message)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }

    async fn send(&self, channel: ChannelId, content: String) -> Result<MessageId, PlatformError> {
        let mut sent = self.sent.lock();
        sent.push((channel, content));
        Ok(MessageId::new(sent.len() as u64))
    }

    async fn send_transient(&self, channel: ChannelId, content: String, ttl: Duration) -> Result<(), PlatformError> {
        self.transient.lock().push((channel, content, ttl));
        Ok(())
    }

    async fn timeout(&self, guild: GuildId, user: UserId, until: DateTime<Utc>, _reason: &str) -> Result<(), PlatformError> {
        self.timeouts.lock().push((guild, user, until));
        match self.timeout_result.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
