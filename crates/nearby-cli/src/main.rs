//! nearby - see which of your friends are close by, from the terminal.
//!
//! Fetches the visible friend list from the cloud function service, keeps it
//! fresh while the session is in the foreground, and prints it on every
//! update.

mod app;
mod render;

use std::io;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, Command, HELP};
use nearby_core::Config;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("nearby starting");

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            let mut config = Config::default();
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config
        }
    };

    let app = App::new(&config)?;
    let printer = app.spawn_printer();
    app.start();
    println!("{}", HELP);

    let result = run(&app).await;

    app.stop();
    printer.abort();
    info!("nearby shutting down");
    result
}

async fn run(app: &App) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            line = lines.next_line() => {
                // EOF quits
                let Some(line) = line? else {
                    return Ok(());
                };
                match Command::parse(&line) {
                    Some(command) => {
                        if !app.handle_command(command) {
                            return Ok(());
                        }
                    }
                    None => println!("Unknown command: {}. {}", line.trim(), HELP),
                }
            }
        }
    }
}
