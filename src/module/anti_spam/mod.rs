//! Spam detection and mitigation. Every guild message goes through [`AntiSpam::handle`]:
//! exempt authors are ignored, content filters remove forbidden messages on sight, and the
//! detector decides whether the author has started flooding. Floods are handed to the
//! [`Mitigator`](mitigation::Mitigator).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serenity::client::Context;
use serenity::model::channel::Message;
use serenity::model::id::{RoleId, UserId};

use crate::db::config::ConfigStore;
use crate::dispatch::message_info::MsgInfo;
use crate::dispatch::Dispatch;
use crate::module::anti_spam::detector::{SpamDetector, Verdict};
use crate::module::anti_spam::filters::FilterHit;
use crate::module::anti_spam::mitigation::{MitigationReport, Mitigator};
use crate::module::anti_spam::settings::{MAX_COOLDOWN_SECS, MAX_WINDOW_SECS};
use crate::module::anti_spam::state::Actor;
use crate::module::{ModInfo, Module, Sensitivity};
use crate::platform::{HistoricMessage, Platform, PlatformError};

pub mod audit;
pub mod command;
pub mod detector;
pub mod filters;
pub mod mitigation;
pub mod settings;
pub mod state;
pub mod worker;

/// How long filter notices stay up.
pub const FILTER_NOTICE_TTL: Duration = Duration::from_secs(10);
/// How often expired actor state is dropped.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// The parts of an incoming message the pipeline looks at.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message: HistoricMessage,
    pub mentions: Vec<UserId>,
    /// The author's roles in the guild.
    pub roles: Vec<RoleId>,
    pub is_bot: bool,
}

impl IncomingMessage {
    pub fn from_message(ctx: &Context, msg: &Message) -> Self {
        let channel_name = ctx
            .cache
            .channel(msg.channel_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| msg.channel_id.to_string());

        IncomingMessage {
            message: HistoricMessage {
                info: MsgInfo::from(msg),
                channel_name,
                content: msg.content.clone(),
                attachments: msg.attachments.len(),
            },
            mentions: msg.mentions.iter().map(|u| u.id).collect(),
            roles: msg.member.as_ref().map(|m| m.roles.clone()).unwrap_or_default(),
            is_bot: msg.author.bot,
        }
    }
}

/// What the pipeline did with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Exempt,
    Filtered(FilterHit),
    Normal,
    /// Over the threshold while already cooling down.
    Suppressed,
    Mitigated(MitigationReport),
}

/// The spam pipeline, shared between the message hook and the `spam` command.
pub struct AntiSpam {
    detector: SpamDetector,
    mitigator: Mitigator,
    platform: Arc<dyn Platform>,
    config: Arc<ConfigStore>,
}

impl AntiSpam {
    pub fn new(detector: SpamDetector, mitigator: Mitigator, platform: Arc<dyn Platform>, config: Arc<ConfigStore>) -> Self {
        AntiSpam { detector, mitigator, platform, config }
    }

    pub fn detector(&self) -> &SpamDetector {
        &self.detector
    }

    pub fn mitigator(&self) -> &Mitigator {
        &self.mitigator
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    #[instrument(level = "trace", skip(self, incoming), fields(msg = %incoming.message.info.msg))]
    pub async fn handle(&self, incoming: &IncomingMessage, now: DateTime<Utc>) -> crate::error::Result<Handled> {
        let info = incoming.message.info;
        let guild = match info.guild {
            Some(g) if !incoming.is_bot => g,
            _ => return Ok(Handled::Exempt),
        };

        let settings = self.config.spam_settings(guild);
        if settings.is_exempt(&incoming.roles) {
            trace!("{} holds an exempt role", info.user);
            return Ok(Handled::Exempt);
        }

        if let Some(hit) = filters::check(&incoming.message.content, &incoming.mentions, settings.max_mentions) {
            debug!("filtered message {} from {}: {:?}", info.msg, info.user, hit);
            match self.platform.delete_message(info.channel, info.msg).await {
                Ok(()) | Err(PlatformError::NotFound) => {}
                Err(e) => warn!("couldn't delete filtered message {}: {}", info.msg, e),
            }
            let notice = format!("<@{}> {}", info.user, hit.notice());
            if let Err(e) = self.platform.send_transient(info.channel, notice, FILTER_NOTICE_TTL).await {
                warn!("couldn't post filter notice in {}: {}", info.channel, e);
            }
            return Ok(Handled::Filtered(hit));
        }

        match self.detector.observe(Actor::new(guild, info.user), now, &settings) {
            Verdict::Normal => Ok(Handled::Normal),
            Verdict::Suppressed => {
                trace!("{} is still cooling down", info.user);
                Ok(Handled::Suppressed)
            }
            Verdict::Triggered => {
                warn!("spam detected from {} in {}", info.user, guild);
                let report_to = self.config.mod_log_channel(guild);
                let report = self.mitigator.mitigate(&incoming.message, now, &settings, report_to).await?;
                Ok(Handled::Mitigated(report))
            }
        }
    }

    /// Drops actor state which can no longer affect any verdict, using the largest window and
    /// cooldown any guild may configure.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let max_window = chrono::Duration::seconds(MAX_WINDOW_SECS as i64);
        let max_cooldown = chrono::Duration::seconds(MAX_COOLDOWN_SECS as i64);
        self.detector.store().sweep(now, max_window, max_cooldown)
    }
}

/// Drops expired actor state every [`SWEEP_INTERVAL`] until the process exits.
pub async fn sweep_forever(engine: Arc<AntiSpam>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let dropped = engine.sweep(Utc::now());
        if dropped > 0 {
            debug!("swept {} idle actors", dropped);
        }
    }
}

/// Hooks the pipeline into the dispatcher and provides the `spam` command.
pub struct AntiSpamModule {
    engine: Arc<AntiSpam>,
}

impl AntiSpamModule {
    pub fn new(engine: Arc<AntiSpam>) -> Self {
        AntiSpamModule { engine }
    }
}

#[async_trait::async_trait]
impl Module for AntiSpamModule {
    fn info(&self) -> &ModInfo {
        static INFO: Lazy<ModInfo> = Lazy::new(|| {
            ModInfo::with_name("spam", "views and changes anti-spam settings.")
                .with_sensitivity(Sensitivity::High)
                .with_command(true)
                .with_message_hook(true)
        });
        &INFO
    }

    async fn process(&self, _dis: &Dispatch, ctx: &Context, orig: &Message, command: Vec<String>) -> crate::error::Result<()> {
        command::process(&self.engine, ctx, orig, command).await
    }

    async fn on_message(&self, _dis: &Dispatch, ctx: &Context, orig: &Message) -> crate::error::Result<()> {
        let incoming = IncomingMessage::from_message(ctx, orig);
        self.engine.handle(&incoming, Utc::now()).await?;
        Ok(())
    }
}
