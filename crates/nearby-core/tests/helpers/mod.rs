//! Shared fixtures for the friend visibility cache integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use nearby_core::api::{FriendService, RemoteCallFailure};
use nearby_core::cache::{Completion, FriendVisibilityCache};
use nearby_core::lifecycle::{ApplicationState, LifecycleHub};
use nearby_core::models::{FriendRecord, NearbyFriends};
use nearby_core::reporting::ErrorReporter;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

pub fn friend(name: &str) -> FriendRecord {
    FriendRecord {
        id: format!("fb-{}", name.to_lowercase()),
        display_name: name.to_string(),
        latitude: 40.7128,
        longitude: -74.0060,
        accuracy: 8.0,
        observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

pub fn friends(best: &[&str], nearby: &[&str]) -> NearbyFriends {
    NearbyFriends {
        best_friends: best.iter().map(|n| friend(n)).collect(),
        nearby_friends: nearby.iter().map(|n| friend(n)).collect(),
    }
}

pub fn names(friends: &[FriendRecord]) -> Vec<String> {
    friends.iter().map(|f| f.display_name.clone()).collect()
}

/// Friend service that replays queued results.
///
/// An empty queue answers with empty friend lists. When gated, every fetch
/// waits for a permit from `release_fetches`. `panic_on_next_fetch` makes the
/// next fetch panic instead of answering.
#[derive(Default)]
pub struct ScriptedService {
    responses: Mutex<VecDeque<Result<NearbyFriends, RemoteCallFailure>>>,
    sync_results: Mutex<VecDeque<Result<(), RemoteCallFailure>>>,
    gate: Option<Semaphore>,
    panic_next_fetch: AtomicBool,
    fetches: AtomicUsize,
    syncs: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub fn push_response(&self, response: Result<NearbyFriends, RemoteCallFailure>) {
        self.responses.lock().push_back(response);
    }

    pub fn push_sync_result(&self, result: Result<(), RemoteCallFailure>) {
        self.sync_results.lock().push_back(result);
    }

    pub fn panic_on_next_fetch(&self) {
        self.panic_next_fetch.store(true, Ordering::SeqCst);
    }

    pub fn release_fetches(&self, count: usize) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(count);
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn sync_count(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FriendService for ScriptedService {
    async fn fetch_nearby_friends(&self) -> Result<NearbyFriends, RemoteCallFailure> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.panic_next_fetch.swap(false, Ordering::SeqCst) {
            panic!("friend service crashed");
        }
        if let Some(ref gate) = self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(NearbyFriends::default()))
    }

    async fn trigger_friend_sync(&self) -> Result<(), RemoteCallFailure> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        self.sync_results.lock().pop_front().unwrap_or(Ok(()))
    }
}

/// Error reporter that keeps every reported failure
#[derive(Default)]
pub struct RecordingReporter {
    failures: Mutex<Vec<RemoteCallFailure>>,
}

impl RecordingReporter {
    pub fn failures(&self) -> Vec<RemoteCallFailure> {
        self.failures.lock().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, failure: &RemoteCallFailure) {
        self.failures.lock().push(failure.clone());
    }
}

pub struct Fixture {
    pub service: Arc<ScriptedService>,
    pub reporter: Arc<RecordingReporter>,
    pub lifecycle: Arc<LifecycleHub>,
    pub cache: FriendVisibilityCache,
}

impl Fixture {
    pub fn new(service: Arc<ScriptedService>, state: ApplicationState) -> Self {
        Self::with_interval(service, state, REFRESH_INTERVAL)
    }

    pub fn with_interval(
        service: Arc<ScriptedService>,
        state: ApplicationState,
        interval: Duration,
    ) -> Self {
        let reporter = Arc::new(RecordingReporter::default());
        let lifecycle = Arc::new(LifecycleHub::new(state));
        let cache = FriendVisibilityCache::new(
            service.clone(),
            reporter.clone(),
            lifecycle.clone(),
            interval,
        );
        Self {
            service,
            reporter,
            lifecycle,
            cache,
        }
    }
}

/// Completion callback that bumps `counter`
pub fn counting_completion(counter: &Arc<AtomicUsize>) -> Option<Completion> {
    let counter = Arc::clone(counter);
    Some(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }))
}

/// Let spawned tasks run to completion
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
