//! Per-actor activity windows and cooldowns. Lives only for the lifetime of the process.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serenity::model::id::{GuildId, UserId};

use crate::module::anti_spam::settings::RateLimit;

/// Spam state is tracked per user, per guild.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Actor {
    pub guild: GuildId,
    pub user: UserId,
}

impl Actor {
    pub fn new(guild: GuildId, user: UserId) -> Self {
        Actor { guild, user }
    }
}

#[derive(Debug, Default)]
struct ActorState {
    /// Recent events, oldest first.
    window: VecDeque<DateTime<Utc>>,
    /// Starts of recent suspensions, oldest first.
    suspensions: VecDeque<DateTime<Utc>>,
}

/// Drops entries at the front which fall outside `span` of `now`.
fn prune(q: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, span: Duration) {
    while q.front().map_or(false, |t| now.signed_duration_since(*t) >= span) {
        q.pop_front();
    }
}

impl ActorState {
    fn is_empty(&self) -> bool {
        self.window.is_empty() && self.suspensions.is_empty()
    }
}

/// The only owner of actor state. Every method takes the lock once and never across an await.
#[derive(Debug, Default)]
pub struct ActorStore {
    actors: Mutex<HashMap<Actor, ActorState>>,
}

impl ActorStore {
    /// Appends `now` to the actor's window, prunes it, and returns true if the retained count
    /// reaches the limit's threshold.
    pub fn record_and_check(&self, actor: Actor, now: DateTime<Utc>, limit: RateLimit) -> bool {
        let mut actors = self.actors.lock();
        let state = actors.entry(actor).or_default();
        state.window.push_back(now);
        prune(&mut state.window, now, limit.window);
        state.window.len() >= limit.threshold
    }

    /// The actor's retained events as of `now`.
    pub fn window(&self, actor: Actor, now: DateTime<Utc>, window: Duration) -> Vec<DateTime<Utc>> {
        let mut actors = self.actors.lock();
        match actors.get_mut(&actor) {
            None => Vec::new(),
            Some(state) => {
                prune(&mut state.window, now, window);
                state.window.iter().copied().collect()
            }
        }
    }

    /// Returns true if the actor was suspended less than `cooldown` ago.
    pub fn is_cooling_down(&self, actor: Actor, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let mut actors = self.actors.lock();
        actors.get_mut(&actor).map_or(false, |state| {
            prune(&mut state.suspensions, now, cooldown);
            !state.suspensions.is_empty()
        })
    }

    /// Records a suspension starting at `now` unless one is already cooling down. Returns true
    /// if this call started the cooldown.
    pub fn try_begin_cooldown(&self, actor: Actor, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let mut actors = self.actors.lock();
        let state = actors.entry(actor).or_default();
        prune(&mut state.suspensions, now, cooldown);
        if state.suspensions.is_empty() {
            state.suspensions.push_back(now);
            true
        } else {
            false
        }
    }

    /// Prunes every actor and forgets the ones with nothing left. Returns how many were dropped.
    pub fn sweep(&self, now: DateTime<Utc>, window: Duration, cooldown: Duration) -> usize {
        let mut actors = self.actors.lock();
        let before = actors.len();
        actors.retain(|_, state| {
            prune(&mut state.window, now, window);
            prune(&mut state.suspensions, now, cooldown);
            !state.is_empty()
        });
        before - actors.len()
    }

    /// Number of actors currently tracked.
    pub fn len(&self) -> usize {
        self.actors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
