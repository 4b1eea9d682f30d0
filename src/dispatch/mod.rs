//! Contains the primary event handler for Warden.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serenity::client::{Context, EventHandler};
use serenity::gateway::ActivityData;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::utils::MessageBuilder;

use crate::error::{IntoBotErr, LogErrorExt, SysError};
use crate::module::Module;

pub mod message_info;

/// Every command starts with this.
pub const COMMAND_PREFIX: char = '!';

static CMD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^([\p{Math Symbol}\p{Punctuation}])([\w-]+)(?:\s*)(.*)$"#).expect("command regex is valid")
});

/// Splits `!name rest of line` into the command name and the rest.
pub fn parse_command(content: &str, prefix: char) -> Option<(&str, &str)> {
    let m = CMD_REGEX.captures(content.trim())?;
    let sym = m.get(1)?.as_str();
    if !sym.starts_with(prefix) {
        return None;
    }
    Some((m.get(2)?.as_str(), m.get(3).map_or("", |a| a.as_str().trim())))
}

impl_err!(NoSuchCommand, "No such command.", true);

/// The primary event handler for Warden. Holds the loaded modules.
pub struct Dispatch {
    owner: Option<UserId>,
    filters: Vec<Arc<dyn Module>>,
    commands: HashMap<&'static str, Arc<dyn Module>>,
    hooks: Vec<Arc<dyn Module>>,
}

impl Dispatch {
    pub fn new(owner: Option<UserId>) -> Self {
        Dispatch {
            owner,
            filters: Vec::new(),
            commands: HashMap::new(),
            hooks: Vec::new(),
        }
    }

    /// Registers a module in every role its [`ModInfo`](crate::module::ModInfo) asks for.
    pub fn add_module<M: Module + 'static>(&mut self, m: M) {
        let m: Arc<dyn Module> = Arc::new(m);
        let info = m.info();
        if info.does_filtering {
            self.filters.push(m.clone());
        }
        if info.command {
            self.commands.insert(info.name, m.clone());
        }
        if info.message_hook {
            self.hooks.push(m.clone());
        }
        info!("loaded module {}: {}", info.name, info.help);
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn command_module(&self, name: &str) -> crate::error::Result<&Arc<dyn Module>> {
        self.commands.get(name).ok_or_else(|| NoSuchCommand.into())
    }

    async fn run_hooks(&self, ctx: &Context, msg: &Message) {
        for hook in &self.hooks {
            let res = AssertUnwindSafe(hook.on_message(self, ctx, msg)).catch_unwind().await;
            match res {
                Ok(r) => r.log_error(),
                Err(_) => error!("message hook for {} panicked", hook.info().name),
            }
        }
    }

    #[instrument(level = "debug", skip(self, ctx, msg), fields(author = %msg.author.id))]
    async fn handle_command(&self, ctx: &Context, msg: &Message) -> crate::error::Result<()> {
        let (name, rest) = match parse_command(&msg.content, COMMAND_PREFIX) {
            Some(c) => c,
            None => return Ok(()),
        };

        let mut name = name.to_string();
        for f in &self.filters {
            name = f.filter(self, ctx, msg, name).await?;
        }

        let module = self.command_module(&name)?;
        let mut command = vec![name.clone()];
        command.extend(shell_words::split(rest).into_user_err()?);
        module.process(self, ctx, msg, command).await
    }
}

#[async_trait::async_trait]
impl EventHandler for Dispatch {
    async fn message(&self, ctx: Context, new_message: Message) {
        if new_message.author.id == ctx.cache.current_user().id {
            trace!("Saw a message from myself.");
            return;
        }

        // Commands in DMs are never accepted; the hooks ignore DMs themselves.
        if new_message.guild_id.is_some() {
            let res = AssertUnwindSafe(self.handle_command(&ctx, &new_message))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(SysError::new("command handler panicked").into()));

            if let Err(e) = res {
                let msg = if e.is_user_error() {
                    info!("{}", &e);
                    MessageBuilder::new()
                        .push_codeblock_safe(e.to_string(), None)
                        .build()
                } else {
                    error!("{}", &e);
                    MessageBuilder::new()
                        .push_codeblock_safe("The command failed on the backend. Please contact the bot admin if this persists.", None)
                        .build()
                };

                if let Err(e) = new_message.channel_id.say(&ctx, msg).await {
                    warn!("couldn't report command failure: {}", e);
                }
            }
        }

        self.run_hooks(&ctx, &new_message).await;
    }

    async fn ready(&self, ctx: Context, data_about_bot: Ready) {
        ctx.set_activity(Some(ActivityData::watching("for spam")));
        info!("Warden is up and running in {} servers.", data_about_bot.guilds.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_need_the_prefix() {
        assert_eq!(parse_command("!spam set threshold 7", '!'), Some(("spam", "set threshold 7")));
        assert_eq!(parse_command("  !spam  ", '!'), Some(("spam", "")));
        assert_eq!(parse_command("?spam stats", '!'), None);
        assert_eq!(parse_command("hello !spam", '!'), None);
        assert_eq!(parse_command("just chatting", '!'), None);
    }

    #[test]
    fn unknown_commands_are_user_errors() {
        let dis = Dispatch::new(None);
        let e = dis.command_module("nope").err().unwrap();
        assert!(e.is_user_error());
    }
}
