//! Decides, per message, whether its author has just started spamming.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::module::anti_spam::settings::SpamSettings;
use crate::module::anti_spam::state::{Actor, ActorStore};

/// What the detector concluded about one event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Under the threshold.
    Normal,
    /// Over the threshold and not cooling down: mitigate now. The cooldown has been started.
    Triggered,
    /// Over the threshold, but already mitigated recently.
    Suppressed,
}

/// Combines the rate window with the cooldown. The actor is Suspended while its cooldown runs.
#[derive(Debug, Clone, Default)]
pub struct SpamDetector {
    store: Arc<ActorStore>,
}

impl SpamDetector {
    pub fn store(&self) -> &Arc<ActorStore> {
        &self.store
    }

    /// Records the event and returns the verdict. The event is always recorded, even while the
    /// actor is suspended.
    pub fn observe(&self, actor: Actor, now: DateTime<Utc>, settings: &SpamSettings) -> Verdict {
        if !self.store.record_and_check(actor, now, settings.rate_limit()) {
            return Verdict::Normal;
        }

        if self.store.try_begin_cooldown(actor, now, settings.cooldown()) {
            Verdict::Triggered
        } else {
            Verdict::Suppressed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    use chrono::{Duration, TimeZone};
    use serenity::model::id::{GuildId, UserId};

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    fn actor() -> Actor {
        Actor::new(GuildId::new(10), UserId::new(20))
    }

    #[test]
    fn burst_triggers_exactly_once_per_cooldown() {
        let d = SpamDetector::default();
        let s = SpamSettings::default();
        let verdicts: Vec<_> = (0..20).map(|i| d.observe(actor(), t(i * 500), &s)).collect();

        assert_eq!(verdicts.iter().filter(|v| **v == Verdict::Triggered).count(), 1);
        assert_eq!(verdicts[4], Verdict::Triggered);
        assert!(verdicts[..4].iter().all(|v| *v == Verdict::Normal));
        assert!(verdicts[5..].iter().all(|v| *v == Verdict::Suppressed));
    }

    #[test]
    fn five_in_three_seconds_then_a_sixth() {
        let d = SpamDetector::default();
        let s = SpamSettings::default();
        for i in 0..4 {
            assert_eq!(d.observe(actor(), t(i * 750), &s), Verdict::Normal);
        }
        assert_eq!(d.observe(actor(), t(3_000), &s), Verdict::Triggered);

        // A sixth message one second later is recorded but doesn't re-trigger.
        assert_eq!(d.observe(actor(), t(4_000), &s), Verdict::Suppressed);
        assert_eq!(d.store().window(actor(), t(4_000), s.rate_limit().window).len(), 6);
        assert!(d.store().is_cooling_down(actor(), t(4_000), s.cooldown()));
    }

    #[test]
    fn simultaneous_events_trigger_once() {
        let d = SpamDetector::default();
        let s = SpamSettings::default();
        for i in 0..4 {
            assert_eq!(d.observe(actor(), t(i * 100), &s), Verdict::Normal);
        }

        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let d = d.clone();
                let s = s.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    d.observe(actor(), t(500), &s)
                })
            })
            .collect();

        let verdicts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(verdicts.iter().filter(|v| **v == Verdict::Triggered).count(), 1, "{:?}", verdicts);
        assert!(verdicts.iter().all(|v| *v != Verdict::Normal));
    }

    #[test]
    fn spaced_out_events_never_trigger() {
        let d = SpamDetector::default();
        let s = SpamSettings::default();
        let gap = s.rate_limit().window + Duration::milliseconds(1);
        let mut now = t(0);
        for _ in 0..50 {
            assert_eq!(d.observe(actor(), now, &s), Verdict::Normal);
            now = now + gap;
        }
    }

    #[test]
    fn retriggers_after_cooldown_expires() {
        let d = SpamDetector::default();
        let s = SpamSettings::default();
        for i in 0..5 {
            d.observe(actor(), t(i * 100), &s);
        }
        assert!(d.store().is_cooling_down(actor(), t(1_000), s.cooldown()));

        let later = t(0) + s.cooldown() + Duration::seconds(1);
        assert!(!d.store().is_cooling_down(actor(), later, s.cooldown()));
        let burst: Vec<_> = (0..5)
            .map(|i| d.observe(actor(), later + Duration::milliseconds(i * 100), &s))
            .collect();
        assert_eq!(burst.last(), Some(&Verdict::Triggered));
    }
}
