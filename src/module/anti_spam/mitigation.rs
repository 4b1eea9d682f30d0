//! What happens once someone is caught spamming: cleanup of their recent messages and a timeout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serenity::model::id::ChannelId;

use crate::error::GuildOnly;
use crate::module::anti_spam::audit;
use crate::module::anti_spam::settings::SpamSettings;
use crate::module::anti_spam::worker::{Batch, DeleteJob, DeleteQueue};
use crate::platform::{HistoricMessage, Platform, PlatformError};

/// Pacing and notice lifetimes for mitigation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MitigationConfig {
    /// Pause the history scan after this many collected messages.
    pub throttle_every: usize,
    pub throttle_pause: Duration,
    /// How long the summary notice stays up.
    pub summary_ttl: Duration,
    /// How long failure notices stay up.
    pub error_ttl: Duration,
}

impl Default for MitigationConfig {
    fn default() -> Self {
        MitigationConfig {
            throttle_every: 10,
            throttle_pause: Duration::from_secs(2),
            summary_ttl: Duration::from_secs(30),
            error_ttl: Duration::from_secs(10),
        }
    }
}

/// How the timeout went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutOutcome {
    Applied,
    /// The bot may not time out this member.
    Forbidden,
    Failed(String),
}

/// What one mitigation run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MitigationReport {
    /// Messages handed to the delete queue, including the trigger.
    pub queued: usize,
    /// Channels whose history couldn't be read.
    pub skipped_channels: usize,
    pub audit_file: Option<PathBuf>,
    pub timeout: TimeoutOutcome,
}

/// Carries out mitigation for a triggered actor. The caller has already started the cooldown.
pub struct Mitigator {
    platform: Arc<dyn Platform>,
    queue: DeleteQueue,
    audit_dir: PathBuf,
    config: MitigationConfig,
}

impl Mitigator {
    pub fn new(platform: Arc<dyn Platform>, queue: DeleteQueue, audit_dir: PathBuf, config: MitigationConfig) -> Self {
        Mitigator { platform, queue, audit_dir, config }
    }

    pub fn queue(&self) -> &DeleteQueue {
        &self.queue
    }

    /// Collects the trigger plus the author's history in every text channel sent since
    /// `now - history`. Unreadable channels are skipped. Returns the messages and the number of
    /// skipped channels.
    #[instrument(level = "debug", skip(self, trigger, settings), fields(user = %trigger.info.user))]
    pub async fn collect(&self, trigger: &HistoricMessage, now: DateTime<Utc>, settings: &SpamSettings) -> crate::error::Result<(Vec<HistoricMessage>, usize)> {
        let guild = trigger.info.guild.ok_or(GuildOnly)?;
        let author = trigger.info.user;
        let since = now - settings.history();
        let mut collected = vec![trigger.clone()];
        let mut skipped = 0;

        let channels = match self.platform.text_channels(guild).await {
            Ok(c) => c,
            Err(e) => {
                warn!("couldn't list channels in {}: {}", guild, e);
                Vec::new()
            }
        };

        for channel in &channels {
            let history = match self.platform.history_since(channel, since).await {
                Ok(h) => h,
                Err(PlatformError::Forbidden(_)) => {
                    debug!("no access to #{}, skipping", channel.name);
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("couldn't read #{}: {}", channel.name, e);
                    skipped += 1;
                    continue;
                }
            };

            for m in history {
                if m.info.user != author || m.info.msg == trigger.info.msg {
                    continue;
                }
                collected.push(m);
                if collected.len() % self.config.throttle_every == 0 {
                    tokio::time::sleep(self.config.throttle_pause).await;
                }
            }
        }

        Ok((collected, skipped))
    }

    /// Runs the full mitigation: collect, record, queue deletions, time out, notify.
    #[instrument(skip(self, trigger, settings), fields(guild = ?trigger.info.guild, user = %trigger.info.user))]
    pub async fn mitigate(&self, trigger: &HistoricMessage, now: DateTime<Utc>, settings: &SpamSettings, report_to: Option<ChannelId>) -> crate::error::Result<MitigationReport> {
        let guild = trigger.info.guild.ok_or(GuildOnly)?;
        let user = trigger.info.user;
        let channel = trigger.info.channel;

        let (messages, skipped_channels) = self.collect(trigger, now, settings).await?;

        // The record has to exist before the first delete goes out.
        let audit_file = match audit::write_record(&self.audit_dir, user, now, &messages).await {
            Ok(p) => Some(p),
            Err(e) => {
                error!("couldn't write spam record: {}", e);
                None
            }
        };

        let batch = Batch::new(guild, user, messages.len(), channel, report_to);
        for m in &messages {
            self.queue.push(DeleteJob::new(m.info, batch.clone()))?;
        }
        let queued = messages.len();
        info!("queued {} messages for deletion ({} channels skipped)", queued, skipped_channels);

        let until = now + settings.timeout();
        let timeout_len = humantime::format_duration(settings.timeout().to_std().unwrap_or_default());
        let timeout = match self.platform.timeout(guild, user, until, "Spam detection").await {
            Ok(()) => {
                let notice = format!(
                    "<@{}> spam detected: {} messages queued for deletion and a {} timeout applied.",
                    user, queued, timeout_len
                );
                self.notify(channel, notice, self.config.summary_ttl).await;
                TimeoutOutcome::Applied
            }
            Err(PlatformError::Forbidden(why)) => {
                warn!("not allowed to time out {}: {}", user, why);
                self.notify(channel, "I don't have permission to time out members here.".into(), self.config.error_ttl).await;
                TimeoutOutcome::Forbidden
            }
            Err(e) => {
                error!("couldn't time out {}: {}", user, e);
                TimeoutOutcome::Failed(e.to_string())
            }
        };

        Ok(MitigationReport { queued, skipped_channels, audit_file, timeout })
    }

    async fn notify(&self, channel: ChannelId, text: String, ttl: Duration) {
        if let Err(e) = self.platform.send_transient(channel, text, ttl).await {
            warn!("couldn't post notice in {}: {}", channel, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::message_info::MsgInfo;
    use crate::module::anti_spam::worker::WorkerConfig;
    use crate::platform::mock::MockPlatform;
    use crate::platform::TextChannel;
    use chrono::TimeZone;
    use serenity::model::id::{GuildId, MessageId, UserId};
    use tempdir::TempDir;

    const GUILD: u64 = 1;
    const SPAMMER: u64 = 50;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn msg(id: u64, channel: u64, user: u64, secs_ago: i64) -> HistoricMessage {
        HistoricMessage {
            info: MsgInfo {
                timestamp: now() - chrono::Duration::seconds(secs_ago),
                guild: Some(GuildId::new(GUILD)),
                user: UserId::new(user),
                channel: ChannelId::new(channel),
                msg: MessageId::new(id),
            },
            channel_name: format!("chan-{}", channel),
            content: format!("message {}", id),
            attachments: 0,
        }
    }

    fn channel(id: u64) -> TextChannel {
        TextChannel { id: ChannelId::new(id), name: format!("chan-{}", id) }
    }

    struct Fixture {
        mock: Arc<MockPlatform>,
        mitigator: Mitigator,
        _dir: TempDir,
        _worker: crate::module::anti_spam::worker::DeleteWorker,
    }

    fn fixture() -> Fixture {
        let mock = Arc::new(MockPlatform::default());
        let (queue, worker) = DeleteQueue::new(mock.clone(), WorkerConfig::default());
        let dir = TempDir::new("warden-mitigation").unwrap();
        let mitigator = Mitigator::new(mock.clone(), queue, dir.path().join("spam"), Default::default());
        Fixture { mock, mitigator, _dir: dir, _worker: worker }
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_and_recent_history_are_queued() {
        let f = fixture();
        *f.mock.channels.lock() = vec![channel(10), channel(11)];
        f.mock.history.lock().insert(ChannelId::new(10), Ok(vec![
            msg(100, 10, SPAMMER, 30),
            msg(101, 10, 7, 20),
            // The trigger shows up in history too and must not be queued twice.
            msg(5, 10, SPAMMER, 0),
        ]));
        f.mock.history.lock().insert(ChannelId::new(11), Ok(vec![
            msg(200, 11, SPAMMER, 120),
            // Too old for the history window.
            msg(201, 11, SPAMMER, 11 * 60),
        ]));

        let trigger = msg(5, 10, SPAMMER, 0);
        let report = f.mitigator
            .mitigate(&trigger, now(), &SpamSettings::default(), None)
            .await
            .unwrap();

        assert_eq!(report.queued, 3);
        assert_eq!(report.skipped_channels, 0);
        assert_eq!(report.timeout, TimeoutOutcome::Applied);
        assert_eq!(f.mitigator.queue().stats().queued.load(std::sync::atomic::Ordering::Relaxed), 3);

        let timeouts = f.mock.timeouts.lock().clone();
        assert_eq!(timeouts, vec![(GuildId::new(GUILD), UserId::new(SPAMMER), now() + chrono::Duration::minutes(30))]);

        let notices = f.mock.transient.lock().clone();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, ChannelId::new(10));
        assert!(notices[0].1.contains("3 messages queued"), "{}", notices[0].1);
        assert!(notices[0].1.contains("30m"), "{}", notices[0].1);
        assert_eq!(notices[0].2, Duration::from_secs(30));

        let record = std::fs::read_to_string(report.audit_file.unwrap()).unwrap();
        assert!(record.contains("Message Count: 3"));
        assert!(record.contains("Content: message 200"));
        assert!(!record.contains("Content: message 101"));
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_channels_are_skipped() {
        let f = fixture();
        *f.mock.channels.lock() = vec![channel(10), channel(11), channel(12)];
        f.mock.history.lock().insert(ChannelId::new(10), Err(PlatformError::Forbidden("no".into())));
        f.mock.history.lock().insert(ChannelId::new(11), Err(PlatformError::Other("502".into())));
        f.mock.history.lock().insert(ChannelId::new(12), Ok(vec![msg(300, 12, SPAMMER, 5)]));

        let report = f.mitigator
            .mitigate(&msg(5, 10, SPAMMER, 0), now(), &SpamSettings::default(), None)
            .await
            .unwrap();
        assert_eq!(report.queued, 2);
        assert_eq!(report.skipped_channels, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn forbidden_timeout_is_reported_not_retried() {
        let f = fixture();
        *f.mock.timeout_result.lock() = Some(PlatformError::Forbidden("Moderate Members".into()));

        let report = f.mitigator
            .mitigate(&msg(5, 10, SPAMMER, 0), now(), &SpamSettings::default(), None)
            .await
            .unwrap();
        assert_eq!(report.timeout, TimeoutOutcome::Forbidden);
        assert_eq!(report.queued, 1);
        assert_eq!(f.mock.timeouts.lock().len(), 1);

        let notices = f.mock.transient.lock().clone();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].1.contains("permission"));
        assert_eq!(notices[0].2, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn long_scans_are_throttled() {
        let f = fixture();
        *f.mock.channels.lock() = vec![channel(10)];
        let history: Vec<_> = (100..125).map(|i| msg(i, 10, SPAMMER, 60)).collect();
        f.mock.history.lock().insert(ChannelId::new(10), Ok(history));

        let started = tokio::time::Instant::now();
        let (collected, _) = f.mitigator
            .collect(&msg(5, 10, SPAMMER, 0), now(), &SpamSettings::default())
            .await
            .unwrap();
        assert_eq!(collected.len(), 26);
        // Paused after the 10th and 20th collected message.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(4) && waited < Duration::from_secs(5), "{:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cleanup_is_reported_in_the_trigger_channel() {
        let mock = Arc::new(MockPlatform::default());
        let (queue, worker) = DeleteQueue::new(mock.clone(), WorkerConfig::default());
        let dir = TempDir::new("warden-mitigation").unwrap();
        let mitigator = Mitigator::new(mock.clone(), queue, dir.path().join("spam"), Default::default());
        mock.script_delete(MessageId::new(5), vec![Err(PlatformError::Other("boom".into()))]);

        mitigator.mitigate(&msg(5, 10, SPAMMER, 0), now(), &SpamSettings::default(), None).await.unwrap();
        drop(mitigator);
        worker.run().await;

        assert!(mock.sent.lock().is_empty());
        let notices = mock.transient.lock().clone();
        assert_eq!(notices.len(), 2);
        assert!(notices[0].1.contains("1 messages queued"), "{}", notices[0].1);
        assert_eq!(notices[1].0, ChannelId::new(10));
        assert!(notices[1].1.contains("0 deleted, 1 failed"), "{}", notices[1].1);
    }

    #[tokio::test(start_paused = true)]
    async fn direct_messages_are_rejected() {
        let f = fixture();
        let mut dm = msg(5, 10, SPAMMER, 0);
        dm.info.guild = None;
        assert!(f.mitigator.mitigate(&dm, now(), &SpamSettings::default(), None).await.is_err());
    }
}
