//! Core library for nearby.
//!
//! Keeps track of which friends are currently nearby: the
//! `FriendVisibilityCache` fetches friend lists from the cloud function
//! service, decides when they are stale, refreshes them while the app is in
//! the foreground, and notifies observers of every update.

pub mod api;
pub mod cache;
pub mod config;
pub mod lifecycle;
pub mod models;
pub mod reporting;
pub mod utils;

pub use api::{ApiClient, FriendService, RemoteCallFailure};
pub use cache::{FriendVisibilityCache, UpdateState, VisibilitySnapshot, VisibilityUpdated};
pub use config::Config;
pub use lifecycle::{ApplicationState, LifecycleHub, LifecycleSignal, LifecycleSource, Subscription};
pub use models::{FriendRecord, NearbyFriends};
pub use reporting::{AnalyticsReporter, ErrorReporter, TracingReporter};
