//! Tunables for spam detection and mitigation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serenity::model::id::RoleId;

use crate::error::UserError;

/// How many events within how long count as spam.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RateLimit {
    pub threshold: usize,
    pub window: chrono::Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        SpamSettings::default().rate_limit()
    }
}

/// Anti-spam settings, stored globally and optionally overridden per guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamSettings {
    /// Messages within `window_secs` which count as spam.
    pub threshold: usize,
    pub window_secs: u64,
    /// Most distinct users a single message may mention.
    pub max_mentions: usize,
    /// How long after a trigger the same user can't trigger again.
    pub cooldown_secs: u64,
    /// How far back to look for messages to delete.
    pub history_secs: u64,
    /// How long spammers are timed out for.
    pub timeout_secs: u64,
    /// Members with any of these roles are never checked.
    pub exempt_roles: Vec<RoleId>,
}

impl Default for SpamSettings {
    fn default() -> Self {
        SpamSettings {
            threshold: 5,
            window_secs: 5,
            max_mentions: 5,
            cooldown_secs: 10 * 60,
            history_secs: 10 * 60,
            timeout_secs: 30 * 60,
            exempt_roles: Vec::new(),
        }
    }
}

fn secs(s: u64) -> chrono::Duration {
    chrono::Duration::seconds(s.min(i64::MAX as u64) as i64)
}

impl SpamSettings {
    pub fn rate_limit(&self) -> RateLimit {
        RateLimit { threshold: self.threshold, window: secs(self.window_secs) }
    }

    pub fn cooldown(&self) -> chrono::Duration {
        secs(self.cooldown_secs)
    }

    pub fn history(&self) -> chrono::Duration {
        secs(self.history_secs)
    }

    pub fn timeout(&self) -> chrono::Duration {
        secs(self.timeout_secs)
    }

    pub fn is_exempt(&self, roles: &[RoleId]) -> bool {
        roles.iter().any(|r| self.exempt_roles.contains(r))
    }

    /// The raw value behind a key; seconds for durations.
    pub fn get(&self, key: SettingKey) -> u64 {
        match key {
            SettingKey::Threshold => self.threshold as u64,
            SettingKey::MaxMentions => self.max_mentions as u64,
            SettingKey::Window => self.window_secs,
            SettingKey::Cooldown => self.cooldown_secs,
            SettingKey::History => self.history_secs,
            SettingKey::Timeout => self.timeout_secs,
        }
    }

    /// Sets one key from user input, validating its bounds.
    pub fn set(&mut self, key: SettingKey, value: &str) -> crate::error::Result<()> {
        let v = if key.is_duration() {
            humantime::parse_duration(value.trim())?.as_secs()
        } else {
            value.trim().parse::<u64>()?
        };
        key.check(v)?;

        match key {
            SettingKey::Threshold => self.threshold = v as usize,
            SettingKey::MaxMentions => self.max_mentions = v as usize,
            SettingKey::Window => self.window_secs = v,
            SettingKey::Cooldown => self.cooldown_secs = v,
            SettingKey::History => self.history_secs = v,
            SettingKey::Timeout => self.timeout_secs = v,
        }
        Ok(())
    }

    /// Checks every key against the bounds [`SpamSettings::set`] enforces.
    pub fn validate(&self) -> crate::error::Result<()> {
        SettingKey::ALL.iter().try_for_each(|k| k.check(self.get(*k)))
    }
}

fn show_secs(secs: u64) -> humantime::FormattedDuration {
    humantime::format_duration(Duration::from_secs(secs))
}

/// Longest rate window a guild may configure.
pub const MAX_WINDOW_SECS: u64 = 5 * 60;
/// Longest cooldown a guild may configure.
pub const MAX_COOLDOWN_SECS: u64 = 24 * 60 * 60;

/// The settings which can be changed from chat.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SettingKey {
    Threshold,
    Window,
    MaxMentions,
    Cooldown,
    History,
    Timeout,
}

impl SettingKey {
    pub const ALL: [SettingKey; 6] = [
        SettingKey::Threshold,
        SettingKey::Window,
        SettingKey::MaxMentions,
        SettingKey::Cooldown,
        SettingKey::History,
        SettingKey::Timeout,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            SettingKey::Threshold => "threshold",
            SettingKey::Window => "window",
            SettingKey::MaxMentions => "max-mentions",
            SettingKey::Cooldown => "cooldown",
            SettingKey::History => "history",
            SettingKey::Timeout => "timeout",
        }
    }

    pub const fn is_duration(&self) -> bool {
        !matches!(self, SettingKey::Threshold | SettingKey::MaxMentions)
    }

    /// Inclusive bounds; seconds for durations.
    pub const fn bounds(&self) -> (u64, u64) {
        match self {
            SettingKey::Threshold => (2, 100),
            SettingKey::MaxMentions => (1, 100),
            SettingKey::Window => (1, MAX_WINDOW_SECS),
            SettingKey::Cooldown => (60, MAX_COOLDOWN_SECS),
            SettingKey::History => (0, 60 * 60),
            // Discord caps timeouts at 28 days.
            SettingKey::Timeout => (60, 28 * 24 * 60 * 60),
        }
    }

    fn check(&self, v: u64) -> crate::error::Result<()> {
        let (min, max) = self.bounds();
        if (min..=max).contains(&v) {
            return Ok(());
        }
        let msg = if self.is_duration() {
            format!("{} must be between {} and {}, got {}", self, show_secs(min), show_secs(max), show_secs(v))
        } else {
            format!("{} must be in range [{}, {}], got {}", self, min, max, v)
        };
        Err(UserError::new(msg).into())
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl_err!(UnknownSetting, "Unknown setting; expected one of threshold, window, max-mentions, cooldown, history, timeout.", true);

impl FromStr for SettingKey {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(UnknownSetting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = SpamSettings::default();
        assert_eq!(s.rate_limit(), RateLimit { threshold: 5, window: chrono::Duration::seconds(5) });
        assert_eq!(s.max_mentions, 5);
        assert_eq!(s.cooldown(), chrono::Duration::minutes(10));
        assert_eq!(s.history(), chrono::Duration::minutes(10));
        assert_eq!(s.timeout(), chrono::Duration::minutes(30));
    }

    #[test]
    fn set_parses_counts_and_durations() {
        let mut s = SpamSettings::default();
        s.set("threshold".parse().unwrap(), "7").unwrap();
        s.set("timeout".parse().unwrap(), "1h 30m").unwrap();
        s.set("WINDOW".parse().unwrap(), "10s").unwrap();
        assert_eq!(s.threshold, 7);
        assert_eq!(s.timeout_secs, 90 * 60);
        assert_eq!(s.window_secs, 10);
    }

    #[test]
    fn set_rejects_out_of_range_values() {
        let mut s = SpamSettings::default();
        assert!(s.set(SettingKey::Threshold, "1").is_err());
        assert!(s.set(SettingKey::Timeout, "60d").is_err());
        assert!(s.set(SettingKey::Window, "soon").is_err());
        assert_eq!(s, SpamSettings::default());
    }

    #[test]
    fn validation_uses_the_same_bounds_as_set() {
        assert!(SpamSettings::default().validate().is_ok());

        let zero_threshold = SpamSettings { threshold: 0, ..Default::default() };
        let e = zero_threshold.validate().unwrap_err();
        assert!(e.to_string().starts_with("threshold"), "{}", e);

        let no_cooldown = SpamSettings { cooldown_secs: 0, ..Default::default() };
        assert!(no_cooldown.validate().is_err());

        let long_cooldown = SpamSettings { cooldown_secs: MAX_COOLDOWN_SECS + 1, ..Default::default() };
        assert!(long_cooldown.validate().is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!("volume".parse::<SettingKey>().is_err());
    }

    #[test]
    fn exemption_is_by_any_role() {
        let s = SpamSettings { exempt_roles: vec![RoleId::new(3)], ..Default::default() };
        assert!(s.is_exempt(&[RoleId::new(1), RoleId::new(3)]));
        assert!(!s.is_exempt(&[RoleId::new(1)]));
        assert!(!s.is_exempt(&[]));
    }
}
