//! # tickler-server
//!
//! Reminder daemon for Tickler.  Opens the task store, then runs the
//! dispatcher until Ctrl+C.  Reminders go to the chat bridge named by
//! `NOTIFY_WEBHOOK_URL`, or to the log when it is unset.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tickler_server::{Dispatcher, LogNotifier, Notifier, ServerConfig, TaskBook, WebhookNotifier};
use tickler_shared::constants::APP_NAME;
use tickler_shared::SystemClock;
use tickler_store::{CachedRepository, Database, SqliteRepository, TaskRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Tracing (respects RUST_LOG)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tickler_server=debug,tickler_store=info")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Storage
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    if let Some(path) = db.path() {
        info!(path = %path.display(), "Opened task store");
    }

    let sqlite = SqliteRepository::new(db);
    let repo: Arc<dyn TaskRepository> = if config.read_cache {
        Arc::new(CachedRepository::new(sqlite))
    } else {
        Arc::new(sqlite)
    };
    let book = TaskBook::new(repo);

    // -----------------------------------------------------------------------
    // 4. Notification channel
    // -----------------------------------------------------------------------
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            info!(url = %url, "Delivering reminders through webhook");
            Arc::new(WebhookNotifier::new(url.clone(), config.delivery_timeout)?)
        }
        None => {
            info!("No webhook configured, reminders will only be logged");
            Arc::new(LogNotifier)
        }
    };

    // -----------------------------------------------------------------------
    // 5. Dispatcher (runs until shutdown)
    // -----------------------------------------------------------------------
    let dispatcher = Dispatcher::new(book, notifier, Arc::new(SystemClock))
        .with_interval(config.dispatch_interval)
        .with_delivery_timeout(config.delivery_timeout)
        .spawn();

    info!("{} server running", APP_NAME);

    tokio::select! {
        result = dispatcher => {
            if let Err(e) = result {
                error!(error = %e, "Dispatcher stopped unexpectedly");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
