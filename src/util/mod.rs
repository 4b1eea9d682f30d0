//! Contains misc utility extension traits and types.

use std::ffi::OsString;

use serenity::model::id::{ChannelId, RoleId};
use structopt::StructOpt;

use crate::error::{IntoBotErr, UserError};

/// An extension trait to allow for extraction of the help string from command invocations,
/// as well as converting errors into Warden errors.
pub trait ClapExt: StructOpt + Sized {
    /// Extracts help text and converts errors into Warden errors. Additionally strips
    /// ANSI escapes from the help text.
    fn from_iter_with_help<I>(i: I) -> crate::error::Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<OsString> + Clone,
    {
        match Self::from_iter_safe(i) {
            Err(e) => {
                let escaped = strip_ansi_escapes::strip(e.to_string()).into_sys_err()?;
                let b = String::from_utf8_lossy(&escaped);
                Err(UserError::new(b).into())
            }
            Ok(s) => Ok(s),
        }
    }
}

impl<T> ClapExt for T where T: StructOpt + Sized {}

fn parse_snowflake(s: &str, prefix: &str, what: &str) -> crate::error::Result<u64> {
    let s = s.trim();
    let raw = s
        .strip_prefix(prefix)
        .and_then(|r| r.strip_suffix('>'))
        .unwrap_or(s);
    match raw.parse::<u64>() {
        Ok(id) if id != 0 => Ok(id),
        _ => Err(UserError::new(format!("Expected a {} mention or id, got {}", what, s)).into()),
    }
}

/// Accepts `<@&id>` or a bare id.
pub fn parse_role(s: &str) -> crate::error::Result<RoleId> {
    parse_snowflake(s, "<@&", "role").map(RoleId::new)
}

/// Accepts `<#id>` or a bare id.
pub fn parse_channel(s: &str) -> crate::error::Result<ChannelId> {
    parse_snowflake(s, "<#", "channel").map(ChannelId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_and_bare_ids_both_parse() {
        assert_eq!(parse_role("<@&42>").unwrap(), RoleId::new(42));
        assert_eq!(parse_role(" 42 ").unwrap(), RoleId::new(42));
        assert_eq!(parse_channel("<#7>").unwrap(), ChannelId::new(7));
    }

    #[test]
    fn garbage_ids_are_user_errors() {
        let e = parse_channel("general").unwrap_err();
        assert!(e.is_user_error());
        assert!(parse_role("0").is_err());
        assert!(parse_role("<#42>").is_err());
    }

    #[derive(Debug, StructOpt)]
    #[structopt(name = "demo")]
    struct Demo {
        value: u32,
    }

    #[test]
    fn clap_errors_become_user_errors() {
        let ok = Demo::from_iter_with_help(vec!["demo", "3"]).unwrap();
        assert_eq!(ok.value, 3);
        let e = Demo::from_iter_with_help(vec!["demo"]).unwrap_err();
        assert!(e.is_user_error());
    }
}
