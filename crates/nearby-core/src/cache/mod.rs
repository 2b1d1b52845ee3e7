//! In-memory cache of the friends currently visible to the user.
//!
//! This module provides the `FriendVisibilityCache`, which keeps the last
//! fetched nearby and best friends, refetches them once they are more than
//! 30 seconds old, and refreshes them on a timer while the app is active.
//!
//! Observers subscribe to `VisibilityUpdated` notifications and read the new
//! `VisibilitySnapshot` from the cache.

pub mod manager;
pub mod snapshot;

pub use manager::{
    Completion, FriendVisibilityCache, UpdateState, VisibilityUpdated, DEFAULT_REFRESH_INTERVAL,
};
pub use snapshot::VisibilitySnapshot;
