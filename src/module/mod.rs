//! Modules plug behavior into the dispatcher: command handlers, command filters, and hooks
//! which see every message.

use std::fmt;
use std::fmt::Formatter;

use serenity::client::Context;
use serenity::model::channel::Message;

use crate::dispatch::Dispatch;

pub mod anti_spam;
pub mod base_filter;
pub mod privilege;

/// How careful the dispatcher must be about who runs a command.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Sensitivity {
    /// Anyone should be able to run at any time.
    Low,
    /// Sensitive commands related to managing users/spam.
    High,
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Sensitivity::Low => "low",
            Sensitivity::High => "high",
        };
        f.write_str(s)
    }
}

/// Static description of a module.
#[derive(Debug)]
pub struct ModInfo {
    pub name: &'static str,
    pub help: &'static str,
    pub sensitivity: Sensitivity,
    pub does_filtering: bool,
    pub command: bool,
    pub message_hook: bool,
}

impl ModInfo {
    pub fn with_name(name: &'static str, help: &'static str) -> Self {
        ModInfo {
            name,
            help,
            sensitivity: Sensitivity::High,
            does_filtering: false,
            command: false,
            message_hook: false,
        }
    }

    pub fn with_command(mut self, command: bool) -> Self {
        self.command = command;
        self
    }

    pub fn with_filter(mut self, does_filtering: bool) -> Self {
        self.does_filtering = does_filtering;
        self
    }

    pub fn with_message_hook(mut self, message_hook: bool) -> Self {
        self.message_hook = message_hook;
        self
    }

    pub fn with_sensitivity(mut self, s: Sensitivity) -> Self {
        self.sensitivity = s;
        self
    }
}

impl_err!(UnimplementedModule, "This module hasn't been finished yet.", true);

#[async_trait::async_trait]
pub trait Module: Sync + Send {
    fn info(&self) -> &ModInfo;

    /// Runs before any command; may reject it by returning an error.
    async fn filter(&self, _dis: &Dispatch, _ctx: &Context, _orig: &Message, name: String) -> crate::error::Result<String> {
        Ok(name)
    }

    /// Runs the command. `command[0]` is the command name.
    async fn process(&self, _dis: &Dispatch, _ctx: &Context, _orig: &Message, _command: Vec<String>) -> crate::error::Result<()> {
        Err(UnimplementedModule.into())
    }

    /// Sees every message the bot receives, commands included.
    async fn on_message(&self, _dis: &Dispatch, _ctx: &Context, _orig: &Message) -> crate::error::Result<()> {
        Ok(())
    }
}
