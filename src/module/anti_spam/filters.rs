//! Single-message content filters. These are pure and run before rate tracking.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serenity::model::id::UserId;

static INVITE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:www\.)?(?:discord\.(?:gg|io|me|li)|discord(?:app)?\.com/invite)/[a-z0-9]+")
        .expect("invite regex is valid")
});

/// Returns true if the text contains a server invite link.
pub fn contains_invite_link(content: &str) -> bool {
    INVITE_REGEX.is_match(content)
}

/// Counts the distinct users mentioned.
pub fn distinct_mentions<'a>(mentions: impl IntoIterator<Item = &'a UserId>) -> usize {
    mentions.into_iter().collect::<HashSet<_>>().len()
}

/// Why a message was removed without touching the rate tracker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterHit {
    InviteLink,
    ExcessiveMentions(usize),
}

impl FilterHit {
    /// The notice shown to the author.
    pub fn notice(&self) -> &'static str {
        match self {
            FilterHit::InviteLink => "posting server invite links is not allowed here.",
            FilterHit::ExcessiveMentions(_) => "mentioning that many people at once is not allowed here.",
        }
    }
}

/// Runs every filter over a message; the first hit wins.
pub fn check(content: &str, mentions: &[UserId], max_mentions: usize) -> Option<FilterHit> {
    if contains_invite_link(content) {
        return Some(FilterHit::InviteLink);
    }

    let n = distinct_mentions(mentions);
    if n > max_mentions {
        return Some(FilterHit::ExcessiveMentions(n));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_links_are_detected() {
        for s in &[
            "join discord.gg/abc123",
            "https://discord.gg/AbC123 now",
            "http://www.discord.io/xyz",
            "discord.me/server1",
            "discord.li/q",
            "https://discordapp.com/invite/abc",
            "https://discord.com/invite/abc",
            "DISCORD.GG/SHOUTING",
        ] {
            assert!(contains_invite_link(s), "{}", s);
        }
    }

    #[test]
    fn ordinary_links_are_not_invites() {
        for s in &[
            "discord.gg",
            "https://discord.com/channels/1/2/3",
            "see example.gg/abc",
            "i love discord, gg",
        ] {
            assert!(!contains_invite_link(s), "{}", s);
        }
    }

    #[test]
    fn mentions_count_distinct_users() {
        let ids: Vec<_> = [1u64, 2, 2, 3, 1].iter().map(|&i| UserId::new(i)).collect();
        assert_eq!(distinct_mentions(&ids), 3);
    }

    #[test]
    fn mention_limit_is_exclusive() {
        let five: Vec<_> = (1..=5u64).map(UserId::new).collect();
        let six: Vec<_> = (1..=6u64).map(UserId::new).collect();
        assert_eq!(check("hi", &five, 5), None);
        assert_eq!(check("hi", &six, 5), Some(FilterHit::ExcessiveMentions(6)));
    }

    #[test]
    fn invites_win_over_mentions() {
        let six: Vec<_> = (1..=6u64).map(UserId::new).collect();
        assert_eq!(check("discord.gg/abc123", &six, 5), Some(FilterHit::InviteLink));
    }
}
