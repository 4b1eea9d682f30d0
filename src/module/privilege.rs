use once_cell::sync::Lazy;
use serenity::client::Context;
use serenity::model::channel::Message;
use serenity::model::Permissions;

use crate::dispatch::Dispatch;
use crate::error::{GuildNotInCache, GuildOnly, InsufficientPermissions};
use crate::module::{ModInfo, Module, Sensitivity};

/// Only lets guild owners, administrators, and members with Manage Server run
/// [`Sensitivity::High`] commands.
pub struct PrivilegeFilter;

/// Whether a member with `perms` may run high sensitivity commands.
pub fn is_privileged(perms: Permissions) -> bool {
    perms.contains(Permissions::ADMINISTRATOR) || perms.contains(Permissions::MANAGE_GUILD)
}

#[async_trait::async_trait]
impl Module for PrivilegeFilter {
    fn info(&self) -> &ModInfo {
        static INFO: Lazy<ModInfo> = Lazy::new(|| {
            ModInfo::with_name("privilege-check", "restricts sensitive commands to server managers.")
                .with_filter(true)
                .with_sensitivity(Sensitivity::High)
        });
        &INFO
    }

    async fn filter(&self, dis: &Dispatch, ctx: &Context, orig: &Message, name: String) -> crate::error::Result<String> {
        let cmd = dis.command_module(&name)?;
        if cmd.info().sensitivity < Sensitivity::High {
            trace!("Not a sensitive command.");
            return Ok(name);
        }

        if dis.owner() == Some(orig.author.id) {
            debug!("Bot owner ran command.");
            return Ok(name);
        }

        let gid = orig.guild_id.ok_or(GuildOnly)?;
        let cached = {
            let guild = ctx.cache.guild(gid).ok_or(GuildNotInCache)?;
            if guild.owner_id == orig.author.id {
                debug!("Guild owner ran command.");
                return Ok(name);
            }
            guild.members.get(&orig.author.id).map(|m| guild.member_permissions(m))
        };

        let perms = match cached {
            Some(p) => p,
            None => {
                let member = gid.member(ctx, orig.author.id).await?;
                let guild = ctx.cache.guild(gid).ok_or(GuildNotInCache)?;
                guild.member_permissions(&member)
            }
        };

        if is_privileged(perms) {
            trace!("Mod ran command.");
            Ok(name)
        } else {
            Err(InsufficientPermissions.into())
        }
    }
}
