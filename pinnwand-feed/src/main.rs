use pinnwand_feed::session::{
    DEFAULT_LOAD_DELAY, FeedSession, NotificationKind, NotificationSink,
};
use pinnwand_store::storage::{FileStorage, StorageEvent};
use pinnwand_store::store::POSTS_KEY;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error installing signal handler: {0}")]
    Signal(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct Env {
    storage_dir: PathBuf,
    load_delay_ms: Option<u64>,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pinnwand_feed=debug,pinnwand_store=debug,pinnwand_common=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, kind: NotificationKind, message: &str) {
        match kind {
            NotificationKind::Error => error!(notification = message, "Notifying user"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let load_delay = env
        .load_delay_ms
        .map_or(DEFAULT_LOAD_DELAY, Duration::from_millis);
    let storage = FileStorage::new(env.storage_dir);

    let (event_tx, event_rx) = broadcast::channel(16);
    let (session, handle) = FeedSession::mount(storage, TracingSink, event_rx, load_delay);
    let session_task = tokio::spawn(session.run());

    // SIGHUP stands in for the hosting environment's storage-change push.
    let mut reload_signal = signal(SignalKind::hangup()).map_err(InitError::Signal)?;
    let mut snapshot = handle.snapshot();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Ctrl-C handler failed");
                }
                break;
            }
            _ = reload_signal.recv() => {
                info!("SIGHUP received, reloading posts");
                let _ = event_tx.send(StorageEvent {
                    key: POSTS_KEY.to_owned(),
                });
            }
            changed = snapshot.changed() => {
                if changed.is_err() {
                    break;
                }
                let feed = snapshot.borrow_and_update();
                if feed.loading {
                    info!("Feed loading");
                } else if feed.is_empty() {
                    info!("Feed empty");
                } else {
                    info!(posts = feed.posts.len(), "Feed populated");
                }
            }
        }
    }

    handle.teardown();
    let _ = session_task.await;

    Ok(())
}
