//! Compact addressing information for a message.

use std::borrow::Borrow;

use chrono::{DateTime, TimeZone, Utc};
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use serenity::model::prelude::Message;
use serenity::model::Timestamp;

/// Everything needed to find (and delete) a message again, without holding on to the message.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct MsgInfo {
    pub timestamp: DateTime<Utc>,
    pub guild: Option<GuildId>,
    pub user: UserId,
    pub channel: ChannelId,
    pub msg: MessageId,
}

/// Converts unix seconds into a chrono timestamp. Values chrono can't represent become the
/// current time.
pub fn from_unix_secs(secs: i64) -> DateTime<Utc> {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(t) => t,
        None => {
            warn!("timestamp {} is out of range, using the current time", secs);
            Utc::now()
        }
    }
}

/// Converts a serenity timestamp into a chrono one, at second precision.
pub fn to_chrono(ts: Timestamp) -> DateTime<Utc> {
    from_unix_secs(ts.unix_timestamp())
}

impl<BM: Borrow<Message>> From<BM> for MsgInfo {
    fn from(m: BM) -> Self {
        let m = m.borrow();
        MsgInfo {
            timestamp: to_chrono(m.timestamp),
            guild: m.guild_id,
            user: m.author.id,
            channel: m.channel_id,
            msg: m.id,
        }
    }
}
