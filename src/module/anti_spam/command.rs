//! The `spam` command.

use std::sync::atomic::Ordering;
use std::time::Duration;

use itertools::Itertools;
use serenity::builder::{CreateEmbed, CreateMessage};
use serenity::client::Context;
use serenity::model::channel::Message;
use serenity::model::id::ChannelId;
use serenity::model::Colour;
use serenity::utils::MessageBuilder;
use structopt::StructOpt;

use crate::error::{GuildOnly, UserError};
use crate::module::anti_spam::settings::{SettingKey, SpamSettings};
use crate::module::anti_spam::worker::WorkerStats;
use crate::module::anti_spam::AntiSpam;
use crate::util::{parse_channel, parse_role, ClapExt};

/// Warden's main purple.
pub const WARDEN_COLOR: Colour = Colour::new(0xEDBBF3);

#[derive(Debug, StructOpt)]
#[structopt(name = "spam", no_version)]
/// Views and changes anti-spam settings for this server.
pub enum SpamOpt {
    /// Shows the settings in effect.
    Settings,
    /// Changes one setting. Durations are written like "30m" or "1h 30m".
    Set {
        /// One of threshold, window, max-mentions, timeout, history, cooldown.
        key: SettingKey,
        value: String,
    },
    /// Manages roles whose members are never checked for spam.
    Exempt(ExemptOpt),
    /// Sets the channel which receives cleanup summaries, or "none" to stop posting them.
    ModLog {
        channel: String,
    },
    /// Shows delete queue counters.
    Stats,
}

#[derive(Debug, StructOpt)]
pub enum ExemptOpt {
    /// Exempts a role.
    Add { role: String },
    /// Stops exempting a role.
    Remove { role: String },
}

fn pretty_secs(secs: u64) -> String {
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

/// The rows of the settings embed.
pub fn settings_fields(settings: &SpamSettings, mod_log: Option<ChannelId>) -> Vec<(&'static str, String)> {
    let exempt = if settings.exempt_roles.is_empty() {
        "none".to_string()
    } else {
        settings
            .exempt_roles
            .iter()
            .map(|r| format!("<@&{}>", r))
            .join(", ")
    };

    vec![
        ("Rate limit", format!("{} messages in {}", settings.threshold, pretty_secs(settings.window_secs))),
        ("Max mentions", settings.max_mentions.to_string()),
        ("Timeout", pretty_secs(settings.timeout_secs)),
        ("History scan", pretty_secs(settings.history_secs)),
        ("Cooldown", pretty_secs(settings.cooldown_secs)),
        ("Exempt roles", exempt),
        ("Mod log", mod_log.map_or_else(|| "none".to_string(), |c| format!("<#{}>", c))),
    ]
}

/// Plain text dump of the worker counters.
pub fn stats_report(stats: &WorkerStats, tracked: usize) -> String {
    let rows = [
        ("queued", stats.queued.load(Ordering::Relaxed)),
        ("deleted", stats.deleted.load(Ordering::Relaxed)),
        ("already gone", stats.already_gone.load(Ordering::Relaxed)),
        ("forbidden", stats.forbidden.load(Ordering::Relaxed)),
        ("failed", stats.failed.load(Ordering::Relaxed)),
        ("pending", stats.pending()),
        ("tracked users", tracked as u64),
    ];
    rows.iter()
        .map(|(name, v)| format!("{:<14}{}\n", format!("{}:", name), v))
        .collect()
}

fn describe(key: SettingKey, s: &SpamSettings) -> String {
    match key {
        SettingKey::Threshold => s.threshold.to_string(),
        SettingKey::MaxMentions => s.max_mentions.to_string(),
        SettingKey::Window => pretty_secs(s.window_secs),
        SettingKey::Cooldown => pretty_secs(s.cooldown_secs),
        SettingKey::History => pretty_secs(s.history_secs),
        SettingKey::Timeout => pretty_secs(s.timeout_secs),
    }
}

pub async fn process(engine: &AntiSpam, ctx: &Context, orig: &Message, command: Vec<String>) -> crate::error::Result<()> {
    let guild = orig.guild_id.ok_or(GuildOnly)?;
    let opts = SpamOpt::from_iter_with_help(command)?;
    let config = engine.config();

    let reply = match opts {
        SpamOpt::Settings => {
            let fields = settings_fields(&config.spam_settings(guild), config.mod_log_channel(guild));
            let embed = CreateEmbed::new()
                .title("Anti-spam settings")
                .colour(WARDEN_COLOR)
                .fields(fields.into_iter().map(|(name, value)| (name, value, true)));
            orig.channel_id
                .send_message(ctx, CreateMessage::new().embed(embed).reference_message(orig))
                .await?;
            return Ok(());
        }
        SpamOpt::Set { key, value } => {
            let updated = config.update_spam_settings(guild, move |s| s.set(key, &value)).await?;
            info!("{} set {} in {}", orig.author.id, key, guild);
            format!("{} is now {}.", key, describe(key, &updated))
        }
        SpamOpt::Exempt(op) => {
            let (role, add) = match op {
                ExemptOpt::Add { role } => (parse_role(&role)?, true),
                ExemptOpt::Remove { role } => (parse_role(&role)?, false),
            };
            let known = ctx.cache.guild(guild).map(|g| g.roles.contains_key(&role));
            if add && known == Some(false) {
                return Err(UserError::new(format!("No such role in this server: {}", role)).into());
            }

            config.update_spam_settings(guild, move |s| {
                if add {
                    if !s.exempt_roles.contains(&role) {
                        s.exempt_roles.push(role);
                    }
                } else {
                    s.exempt_roles.retain(|r| *r != role);
                }
                Ok(())
            }).await?;

            if add {
                format!("Members with <@&{}> are no longer checked for spam.", role)
            } else {
                format!("<@&{}> is no longer exempt.", role)
            }
        }
        SpamOpt::ModLog { channel } => {
            let channel = if channel.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                let id = parse_channel(&channel)?;
                let known = ctx.cache.guild(guild).map(|g| g.channels.contains_key(&id));
                if known == Some(false) {
                    return Err(UserError::new(format!("No such channel in this server: {}", id)).into());
                }
                Some(id)
            };
            config.set_mod_log_channel(guild, channel).await?;
            match channel {
                Some(c) => format!("Cleanup summaries will be posted in <#{}>.", c),
                None => "Cleanup summaries will no longer be posted.".to_string(),
            }
        }
        SpamOpt::Stats => {
            let report = stats_report(engine.mitigator().queue().stats(), engine.detector().store().len());
            MessageBuilder::new().push_codeblock_safe(report, None).build()
        }
    };

    orig.reply(ctx, reply).await?;
    Ok(())
}
