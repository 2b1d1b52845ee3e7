use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::FriendService;
use crate::lifecycle::{ApplicationState, LifecycleSignal, LifecycleSource, Subscription};
use crate::models::{FriendRecord, NearbyFriends};
use crate::reporting::ErrorReporter;

use super::VisibilitySnapshot;

/// Default time after which the snapshot is considered stale, and the period
/// of the foreground refresh timer.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Buffer size for the update notification channel.
/// Notifications carry no data, so slow observers only need to see the latest.
const UPDATES_CHANNEL_SIZE: usize = 16;

/// Callback invoked after a successful operation
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Notification sent to observers after every successful refresh.
/// Read the new state from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityUpdated;

/// Lifecycle-managed update state of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Not observing lifecycle signals
    Idle,
    /// Observing lifecycle signals, periodic timer stopped
    Observing,
    /// Observing lifecycle signals with the periodic timer running
    Running,
}

type SharedFetch = Shared<BoxFuture<'static, bool>>;

struct Inner {
    service: Arc<dyn FriendService>,
    reporter: Arc<dyn ErrorReporter>,
    lifecycle: Arc<dyn LifecycleSource>,
    refresh_interval: Duration,
    snapshot: RwLock<VisibilitySnapshot>,
    updates_tx: broadcast::Sender<VisibilityUpdated>,
    in_flight: Mutex<Option<SharedFetch>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// Empties the in-flight slot when dropped, including when the fetch panics.
struct InFlightGuard<'a>(&'a Mutex<Option<SharedFetch>>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().take();
    }
}

impl Inner {
    async fn fetch_and_apply(&self) -> bool {
        match self.service.fetch_nearby_friends().await {
            Ok(friends) => {
                self.apply(friends);
                true
            }
            Err(failure) => {
                warn!(code = failure.code, "Nearby friends refresh failed, keeping previous snapshot");
                self.reporter.report(&failure);
                false
            }
        }
    }

    fn apply(&self, friends: NearbyFriends) {
        let (nearby, best) = (friends.nearby_friends.len(), friends.best_friends.len());
        self.snapshot.write().apply(friends, Utc::now());
        info!(nearby, best, "Friend visibility updated");
    }

    fn notify_updated(&self) {
        // Err only means nobody is listening
        let _ = self.updates_tx.send(VisibilityUpdated);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

/// Cache of the friends currently visible to the user.
///
/// Holds the last successfully fetched `VisibilitySnapshot`, refetches it when
/// it goes stale, and, once `begin_lifecycle_managed_updates` is called,
/// refreshes it periodically while the application is active.
///
/// Clone is cheap; all clones share the same state. Operations that start
/// background work spawn Tokio tasks and must run inside a Tokio runtime.
#[derive(Clone)]
pub struct FriendVisibilityCache {
    inner: Arc<Inner>,
}

impl FriendVisibilityCache {
    pub fn new(
        service: Arc<dyn FriendService>,
        reporter: Arc<dyn ErrorReporter>,
        lifecycle: Arc<dyn LifecycleSource>,
        refresh_interval: Duration,
    ) -> Self {
        let (updates_tx, _) = broadcast::channel(UPDATES_CHANNEL_SIZE);
        Self {
            inner: Arc::new(Inner {
                service,
                reporter,
                lifecycle,
                refresh_interval,
                snapshot: RwLock::new(VisibilitySnapshot::default()),
                updates_tx,
                in_flight: Mutex::new(None),
                timer: Mutex::new(None),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // ===== Snapshot access =====

    pub fn snapshot(&self) -> VisibilitySnapshot {
        self.inner.snapshot.read().clone()
    }

    /// Nearby friends followed by best friends, `None` until both are known
    pub fn visible(&self) -> Option<Vec<FriendRecord>> {
        self.inner.snapshot.read().visible()
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.inner.snapshot.read().last_updated_at()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.inner.refresh_interval
    }

    /// Receive a `VisibilityUpdated` after every successful refresh
    pub fn subscribe(&self) -> broadcast::Receiver<VisibilityUpdated> {
        self.inner.updates_tx.subscribe()
    }

    pub fn is_stale(&self) -> bool {
        self.inner
            .snapshot
            .read()
            .is_stale(self.inner.refresh_interval, Utc::now())
    }

    // ===== Refreshing =====

    /// Refresh only if the snapshot is missing or older than the refresh interval.
    /// Returns whether a refresh was performed.
    pub async fn refresh_if_stale(&self) -> bool {
        if !self.is_stale() {
            debug!("Friend visibility is fresh, skipping refresh");
            return false;
        }
        self.refresh(None).await;
        true
    }

    /// Fetch the friend lists and replace the snapshot.
    ///
    /// On failure the error goes to the reporter and the previous snapshot is
    /// kept. `on_complete` runs only after a successful update. If a fetch is
    /// already in flight this call waits for it instead of starting another.
    pub async fn refresh(&self, on_complete: Option<Completion>) {
        if self.shared_fetch().await {
            if let Some(on_complete) = on_complete {
                on_complete();
            }
        }
    }

    /// Join the in-flight fetch, or start one.
    ///
    /// The fetch runs on its own task so that dropping a waiter (for example
    /// when the timer is stopped) does not cancel the request.
    fn shared_fetch(&self) -> SharedFetch {
        let mut slot = self.inner.in_flight.lock();
        if let Some(ref fetch) = *slot {
            debug!("Joining in-flight friend visibility refresh");
            return fetch.clone();
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let guard = InFlightGuard(&inner.in_flight);
            let updated = inner.fetch_and_apply().await;
            // Observers reacting to the notification must be able to start a new fetch
            drop(guard);
            if updated {
                inner.notify_updated();
            }
            updated
        });
        let fetch = async move {
            task.await.unwrap_or_else(|err| {
                error!(error = %err, "Friend visibility refresh task failed");
                false
            })
        }
        .boxed()
        .shared();
        *slot = Some(fetch.clone());
        fetch
    }

    /// Ask the server to rebuild the friend graph. Does not touch the snapshot.
    pub async fn request_friend_sync(&self, on_complete: Option<Completion>) {
        match self.inner.service.trigger_friend_sync().await {
            Ok(()) => {
                info!("Friend sync completed");
                if let Some(on_complete) = on_complete {
                    on_complete();
                }
            }
            Err(failure) => {
                warn!(code = failure.code, "Friend sync failed");
                self.inner.reporter.report(&failure);
            }
        }
    }

    // ===== Lifecycle-managed updates =====

    /// Refresh whenever the app becomes active and periodically while it stays active.
    ///
    /// Any previous registration is torn down first, so calling this again
    /// never duplicates timers or subscriptions.
    pub fn begin_lifecycle_managed_updates(&self) {
        self.end_lifecycle_managed_updates();

        let weak = Arc::downgrade(&self.inner);
        let became_active = self.inner.lifecycle.subscribe(
            LifecycleSignal::BecameActive,
            Arc::new(move || {
                if let Some(cache) = Self::from_weak(&weak) {
                    cache.start_periodic_timer();
                    tokio::spawn(async move {
                        cache.refresh_if_stale().await;
                    });
                }
            }),
        );

        let weak = Arc::downgrade(&self.inner);
        let resigned_active = self.inner.lifecycle.subscribe(
            LifecycleSignal::ResignedActive,
            Arc::new(move || {
                if let Some(cache) = Self::from_weak(&weak) {
                    cache.stop_periodic_timer();
                }
            }),
        );

        *self.inner.subscriptions.lock() = vec![became_active, resigned_active];
        info!("Lifecycle-managed friend updates started");

        if self.inner.lifecycle.state() == ApplicationState::Active {
            let cache = self.clone();
            tokio::spawn(async move {
                cache.refresh(None).await;
            });
            self.start_periodic_timer();
        }
    }

    /// Stop the periodic timer and drop all lifecycle subscriptions.
    /// Requests already in flight still complete.
    pub fn end_lifecycle_managed_updates(&self) {
        self.stop_periodic_timer();
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.lock());
        if !subscriptions.is_empty() {
            info!("Lifecycle-managed friend updates stopped");
        }
        drop(subscriptions);
    }

    pub fn update_state(&self) -> UpdateState {
        if self.inner.subscriptions.lock().is_empty() {
            UpdateState::Idle
        } else if self.inner.timer.lock().is_some() {
            UpdateState::Running
        } else {
            UpdateState::Observing
        }
    }

    fn start_periodic_timer(&self) {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.refresh_interval;

        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = Self::from_weak(&weak) else {
                    break;
                };
                debug!("Periodic friend visibility refresh");
                // The period equals the staleness threshold, so always refresh
                cache.refresh(None).await;
            }
        });

        if let Some(previous) = self.inner.timer.lock().replace(timer) {
            previous.abort();
        }
        debug!(period_secs = period.as_secs(), "Periodic refresh timer started");
    }

    fn stop_periodic_timer(&self) {
        if let Some(timer) = self.inner.timer.lock().take() {
            timer.abort();
            debug!("Periodic refresh timer stopped");
        }
    }
}
