//! Application lifecycle signals.
//!
//! The friend visibility cache only refreshes periodically while the app is
//! in the foreground. It learns about foreground transitions through a
//! `LifecycleSource`, which hands out `Subscription` handles: a handler stays
//! registered exactly as long as its handle is alive.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

/// Foreground state of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplicationState {
    /// In the foreground and receiving events
    Active,
    /// In the foreground but not receiving events (e.g. during a transition)
    #[default]
    Inactive,
    /// Not visible
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleSignal {
    /// The app moved into the active state
    BecameActive,
    /// The app is about to leave the active state
    ResignedActive,
}

/// Callback run when a subscribed signal fires
pub type SignalHandler = Arc<dyn Fn() + Send + Sync>;

/// Registration handle returned by `LifecycleSource::subscribe`.
///
/// The handler is unregistered when the handle is cancelled or dropped.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unregister the handler now
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

pub trait LifecycleSource: Send + Sync {
    /// Current foreground state
    fn state(&self) -> ApplicationState;

    /// Register `handler` for `signal` until the returned handle is dropped
    fn subscribe(&self, signal: LifecycleSignal, handler: SignalHandler) -> Subscription;
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<u64, (LifecycleSignal, SignalHandler)>,
}

/// In-process lifecycle source.
///
/// The host (the platform shell, or the CLI) reports state changes through
/// `set_state`; subscribers are notified synchronously on the calling thread.
pub struct LifecycleHub {
    state: Mutex<ApplicationState>,
    registry: Arc<Mutex<Registry>>,
}

impl LifecycleHub {
    pub fn new(initial: ApplicationState) -> Self {
        Self {
            state: Mutex::new(initial),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Record a state change, emitting `BecameActive` when entering `Active`
    /// and `ResignedActive` when leaving it.
    pub fn set_state(&self, state: ApplicationState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        if previous == state {
            return;
        }
        debug!(?previous, ?state, "Application state changed");

        if state == ApplicationState::Active {
            self.emit(LifecycleSignal::BecameActive);
        } else if previous == ApplicationState::Active {
            self.emit(LifecycleSignal::ResignedActive);
        }
    }

    /// Run every handler registered for `signal`
    pub fn emit(&self, signal: LifecycleSignal) {
        // Handlers may subscribe or unsubscribe, so run them without the lock held
        let handlers: Vec<SignalHandler> = self
            .registry
            .lock()
            .handlers
            .values()
            .filter(|(s, _)| *s == signal)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        debug!(?signal, handlers = handlers.len(), "Emitting lifecycle signal");
        for handler in handlers {
            handler();
        }
    }

    /// Number of live subscriptions for `signal`
    pub fn subscriber_count(&self, signal: LifecycleSignal) -> usize {
        self.registry
            .lock()
            .handlers
            .values()
            .filter(|(s, _)| *s == signal)
            .count()
    }
}

impl Default for LifecycleHub {
    fn default() -> Self {
        Self::new(ApplicationState::default())
    }
}

impl LifecycleSource for LifecycleHub {
    fn state(&self) -> ApplicationState {
        *self.state.lock()
    }

    fn subscribe(&self, signal: LifecycleSignal, handler: SignalHandler) -> Subscription {
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handlers.insert(id, (signal, handler));
            id
        };

        let registry: Weak<Mutex<Registry>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().handlers.remove(&id);
            }
        })
    }
}
