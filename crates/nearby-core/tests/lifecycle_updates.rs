//! Foreground-driven refresh scheduling of the friend visibility cache.

mod helpers;

use std::time::Duration;

use tokio::time::{sleep, Instant};

use nearby_core::cache::{UpdateState, VisibilityUpdated};
use nearby_core::lifecycle::{ApplicationState, LifecycleSignal};

use helpers::{settle, Fixture, ScriptedService, REFRESH_INTERVAL};

const SLACK: Duration = Duration::from_millis(10);

#[tokio::test(start_paused = true)]
async fn test_begin_while_active_refreshes_and_starts_timer() {
    let fixture = Fixture::new(ScriptedService::new(), ApplicationState::Active);
    let mut updates = fixture.cache.subscribe();
    let started = Instant::now();

    fixture.cache.begin_lifecycle_managed_updates();
    assert_eq!(fixture.cache.update_state(), UpdateState::Running);

    assert_eq!(updates.recv().await, Ok(VisibilityUpdated));
    assert_eq!(fixture.service.fetch_count(), 1);
    assert!(started.elapsed() < REFRESH_INTERVAL);

    // Next update comes from the timer, one full interval later
    assert_eq!(updates.recv().await, Ok(VisibilityUpdated));
    assert_eq!(fixture.service.fetch_count(), 2);
    assert!(started.elapsed() >= REFRESH_INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_timer_refreshes_every_interval() {
    let fixture = Fixture::new(ScriptedService::new(), ApplicationState::Active);
    fixture.cache.begin_lifecycle_managed_updates();
    settle().await;
    assert_eq!(fixture.service.fetch_count(), 1);

    sleep(REFRESH_INTERVAL * 3 + SLACK).await;
    assert_eq!(fixture.service.fetch_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_begin_while_in_background_only_observes() {
    let fixture = Fixture::new(ScriptedService::new(), ApplicationState::Background);

    fixture.cache.begin_lifecycle_managed_updates();
    assert_eq!(fixture.cache.update_state(), UpdateState::Observing);

    sleep(REFRESH_INTERVAL * 2).await;
    assert_eq!(fixture.service.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_becoming_active_refreshes_stale_data_and_starts_timer() {
    let fixture = Fixture::new(ScriptedService::new(), ApplicationState::Background);
    fixture.cache.begin_lifecycle_managed_updates();

    fixture.lifecycle.set_state(ApplicationState::Active);
    assert_eq!(fixture.cache.update_state(), UpdateState::Running);
    settle().await;
    assert_eq!(fixture.service.fetch_count(), 1);

    sleep(REFRESH_INTERVAL + SLACK).await;
    assert_eq!(fixture.service.fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_becoming_active_with_fresh_data_skips_refresh() {
    let fixture = Fixture::new(ScriptedService::new(), ApplicationState::Active);
    fixture.cache.begin_lifecycle_managed_updates();
    settle().await;
    assert_eq!(fixture.service.fetch_count(), 1);

    // Short trip to the background, well within the refresh interval
    fixture.lifecycle.set_state(ApplicationState::Inactive);
    assert_eq!(fixture.cache.update_state(), UpdateState::Observing);
    fixture.lifecycle.set_state(ApplicationState::Active);
    assert_eq!(fixture.cache.update_state(), UpdateState::Running);
    settle().await;
    assert_eq!(fixture.service.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resigning_active_stops_timer() {
    let fixture = Fixture::new(ScriptedService::new(), ApplicationState::Active);
    fixture.cache.begin_lifecycle_managed_updates();
    settle().await;

    fixture.lifecycle.set_state(ApplicationState::Background);
    assert_eq!(fixture.cache.update_state(), UpdateState::Observing);

    sleep(REFRESH_INTERVAL * 4).await;
    assert_eq!(fixture.service.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_begin_twice_keeps_single_timer_and_subscriptions() {
    let fixture = Fixture::new(ScriptedService::new(), ApplicationState::Active);

    fixture.cache.begin_lifecycle_managed_updates();
    settle().await;
    assert_eq!(fixture.service.fetch_count(), 1);

    sleep(Duration::from_secs(10)).await;
    fixture.cache.begin_lifecycle_managed_updates();
    settle().await;
    assert_eq!(fixture.service.fetch_count(), 2);

    assert_eq!(fixture.lifecycle.subscriber_count(LifecycleSignal::BecameActive), 1);
    assert_eq!(fixture.lifecycle.subscriber_count(LifecycleSignal::ResignedActive), 1);
    assert_eq!(fixture.cache.update_state(), UpdateState::Running);

    // The first timer would have fired at 30s
    sleep(Duration::from_secs(25)).await;
    assert_eq!(fixture.service.fetch_count(), 2);

    // The replacement fires 30s after the second call
    sleep(Duration::from_secs(6)).await;
    assert_eq!(fixture.service.fetch_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_end_returns_to_idle() {
    let fixture = Fixture::new(ScriptedService::new(), ApplicationState::Active);
    fixture.cache.begin_lifecycle_managed_updates();
    settle().await;

    fixture.cache.end_lifecycle_managed_updates();
    assert_eq!(fixture.cache.update_state(), UpdateState::Idle);
    assert_eq!(fixture.lifecycle.subscriber_count(LifecycleSignal::BecameActive), 0);
    assert_eq!(fixture.lifecycle.subscriber_count(LifecycleSignal::ResignedActive), 0);

    // Lifecycle signals no longer reach the cache
    fixture.lifecycle.set_state(ApplicationState::Background);
    fixture.lifecycle.set_state(ApplicationState::Active);
    assert_eq!(fixture.cache.update_state(), UpdateState::Idle);

    sleep(REFRESH_INTERVAL * 4).await;
    assert_eq!(fixture.service.fetch_count(), 1);

    // Ending twice is harmless
    fixture.cache.end_lifecycle_managed_updates();
}

#[tokio::test(start_paused = true)]
async fn test_dropping_cache_releases_subscriptions() {
    let fixture = Fixture::new(ScriptedService::new(), ApplicationState::Active);
    fixture.cache.begin_lifecycle_managed_updates();
    settle().await;
    assert_eq!(fixture.lifecycle.subscriber_count(LifecycleSignal::BecameActive), 1);

    let Fixture {
        service,
        lifecycle,
        cache,
        ..
    } = fixture;
    drop(cache);

    assert_eq!(lifecycle.subscriber_count(LifecycleSignal::BecameActive), 0);
    assert_eq!(lifecycle.subscriber_count(LifecycleSignal::ResignedActive), 0);

    sleep(REFRESH_INTERVAL * 2).await;
    assert_eq!(service.fetch_count(), 1);
}
