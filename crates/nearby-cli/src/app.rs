//! Composition root and command handling for the nearby CLI.
//!
//! `App` wires the API client, error reporter, lifecycle hub and friend
//! visibility cache together. The terminal stands in for the platform shell:
//! `background`/`foreground` commands drive the lifecycle hub the way app
//! switching would on a phone.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use nearby_core::cache::{FriendVisibilityCache, VisibilityUpdated};
use nearby_core::lifecycle::{ApplicationState, LifecycleHub};
use nearby_core::{AnalyticsReporter, ApiClient, Config};

use crate::render::render_snapshot;

/// A line of user input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Sync,
    Background,
    Foreground,
    Show,
    Save,
    Help,
    Quit,
}

impl Command {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "r" | "refresh" => Some(Self::Refresh),
            "s" | "sync" => Some(Self::Sync),
            "b" | "background" => Some(Self::Background),
            "f" | "foreground" => Some(Self::Foreground),
            "" | "show" => Some(Self::Show),
            "save" => Some(Self::Save),
            "h" | "help" | "?" => Some(Self::Help),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

pub const HELP: &str = "Commands: refresh, sync, background, foreground, show, save, help, quit";

pub struct App {
    pub cache: FriendVisibilityCache,
    pub lifecycle: Arc<LifecycleHub>,
    /// Effective settings, including environment overrides
    config: Config,
}

impl App {
    /// Build the application from config. Must run inside the Tokio runtime.
    pub fn new(config: &Config) -> Result<Self> {
        if config.application_id.is_none() {
            warn!("No application id configured, requests will likely be rejected");
        }

        let api = ApiClient::new(config)?;
        let reporter = Arc::new(AnalyticsReporter::new(api.clone()));
        let lifecycle = Arc::new(LifecycleHub::new(ApplicationState::Active));
        let cache = FriendVisibilityCache::new(
            Arc::new(api),
            reporter,
            lifecycle.clone(),
            config.refresh_interval(),
        );

        Ok(Self {
            cache,
            lifecycle,
            config: config.clone(),
        })
    }

    pub fn start(&self) {
        info!(
            interval_secs = self.cache.refresh_interval().as_secs(),
            "Starting friend visibility updates"
        );
        self.cache.begin_lifecycle_managed_updates();
    }

    pub fn stop(&self) {
        self.cache.end_lifecycle_managed_updates();
    }

    /// Run a command. Returns `false` when the app should quit.
    pub fn handle_command(&self, command: Command) -> bool {
        match command {
            Command::Refresh => {
                let cache = self.cache.clone();
                tokio::spawn(async move {
                    cache
                        .refresh(Some(Box::new(|| println!("Refreshed."))))
                        .await;
                });
            }
            Command::Sync => {
                let cache = self.cache.clone();
                tokio::spawn(async move {
                    let after_sync = cache.clone();
                    cache
                        .request_friend_sync(Some(Box::new(move || {
                            println!("Friends synced.");
                            // The server graph changed, so the cached lists are out of date
                            tokio::spawn(async move { after_sync.refresh(None).await });
                        })))
                        .await;
                });
            }
            Command::Background => self.lifecycle.set_state(ApplicationState::Background),
            Command::Foreground => self.lifecycle.set_state(ApplicationState::Active),
            Command::Show => self.print_snapshot(),
            Command::Save => self.save_config(),
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
        }
        true
    }

    /// Persist the effective settings so the next run needs no environment variables
    fn save_config(&self) {
        match self.config.save() {
            Ok(path) => println!("Saved settings to {}", path.display()),
            Err(e) => {
                warn!(error = %e, "Failed to save config");
                println!("Could not save settings: {:#}", e);
            }
        }
    }

    pub fn print_snapshot(&self) {
        print_snapshot(&self.cache);
    }

    /// Print the friend list after every update
    pub fn spawn_printer(&self) -> tokio::task::JoinHandle<()> {
        let mut updates = self.cache.subscribe();
        let cache = self.cache.clone();
        tokio::spawn(async move {
            use tokio::sync::broadcast::error::RecvError;
            loop {
                match updates.recv().await {
                    Ok(VisibilityUpdated) | Err(RecvError::Lagged(_)) => print_snapshot(&cache),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

fn print_snapshot(cache: &FriendVisibilityCache) {
    for line in render_snapshot(&cache.snapshot(), Utc::now()) {
        println!("{}", line);
    }
}
