use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{FriendRecord, NearbyFriends};
use crate::utils::format_time_ago;

/// The friend lists last fetched from the server.
///
/// Either list is `None` until the first successful fetch. `visible` is only
/// available once both lists are present; partial data means "not ready",
/// not "empty".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilitySnapshot {
    nearby: Option<Vec<FriendRecord>>,
    best: Option<Vec<FriendRecord>>,
    last_updated_at: Option<DateTime<Utc>>,
}

fn sorted_by_name(friends: Option<Vec<FriendRecord>>) -> Option<Vec<FriendRecord>> {
    friends.map(|mut list| {
        list.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        list
    })
}

impl VisibilitySnapshot {
    pub fn nearby(&self) -> Option<&[FriendRecord]> {
        self.nearby.as_deref()
    }

    pub fn best(&self) -> Option<&[FriendRecord]> {
        self.best.as_deref()
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated_at
    }

    /// Nearby friends followed by best friends, or `None` while either list is missing
    pub fn visible(&self) -> Option<Vec<FriendRecord>> {
        match (&self.nearby, &self.best) {
            (Some(nearby), Some(best)) => Some(nearby.iter().chain(best).cloned().collect()),
            _ => None,
        }
    }

    pub fn set_nearby(&mut self, nearby: Option<Vec<FriendRecord>>) {
        self.nearby = sorted_by_name(nearby);
    }

    pub fn set_best(&mut self, best: Option<Vec<FriendRecord>>) {
        self.best = sorted_by_name(best);
    }

    /// Replace both lists with the result of a successful fetch completed at `now`
    pub fn apply(&mut self, friends: NearbyFriends, now: DateTime<Utc>) {
        self.set_best(Some(friends.best_friends));
        self.set_nearby(Some(friends.nearby_friends));
        // Never move backwards, even if the wall clock does
        self.last_updated_at = Some(match self.last_updated_at {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }

    /// Whether at least `interval` has passed since the last successful fetch
    pub fn is_stale(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        let Some(last_updated_at) = self.last_updated_at else {
            return true;
        };
        let elapsed = now - last_updated_at;
        let elapsed = if elapsed < chrono::Duration::zero() {
            -elapsed
        } else {
            elapsed
        };
        elapsed.to_std().map(|e| e >= interval).unwrap_or(true)
    }

    /// Short description of the snapshot age, "never" before the first fetch
    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        self.last_updated_at
            .map(|at| format_time_ago(at, now))
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
