//! The feed session: one task that owns the [`PostStore`] and reacts to
//! events. The presentation layer talks to it through channels only — user
//! intents go in as [`FeedCommand`]s, render state comes out as a
//! [`FeedSnapshot`] on a watch channel.

use pinnwand_common::model::post::{Comment, Post};
use pinnwand_common::model::{PostId, VoteKind};
use pinnwand_store::storage::{KeyValueStorage, StorageEvent};
use pinnwand_store::store::{POSTS_KEY, PostStore};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// User-facing message raised through the notification sink when a load
/// fails.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load posts. Please refresh the page.";

/// Artificial latency before the initial load, simulating a network round
/// trip.
pub const DEFAULT_LOAD_DELAY: Duration = Duration::from_millis(800);

const COMMAND_BUFFER: usize = 16;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum NotificationKind {
    Error,
}

/// Surfaces failures to the user. Fire and forget.
pub trait NotificationSink {
    fn notify(&self, kind: NotificationKind, message: &str);
}

/// A user intent dispatched by the presentation layer.
#[derive(Clone, Debug)]
pub enum FeedCommand {
    Vote { post_id: PostId, kind: VoteKind },
    Comment { post_id: PostId, comment: Comment },
}

/// What the presentation layer renders: the loading flag plus the current
/// list covers the loading / empty / populated states.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FeedSnapshot {
    pub loading: bool,
    pub posts: Vec<Post>,
}

impl FeedSnapshot {
    fn loading() -> Self {
        Self {
            loading: true,
            posts: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.loading && self.posts.is_empty()
    }
}

/// The presentation layer's end of a mounted session.
#[derive(Clone, Debug)]
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    snapshot: watch::Receiver<FeedSnapshot>,
    cancel: CancellationToken,
}

impl FeedHandle {
    pub async fn vote(&self, post_id: PostId, kind: VoteKind) {
        let _ = self.commands.send(FeedCommand::Vote { post_id, kind }).await;
    }

    pub async fn comment(&self, post_id: PostId, comment: Comment) {
        let _ = self
            .commands
            .send(FeedCommand::Comment { post_id, comment })
            .await;
    }

    #[must_use]
    pub fn snapshot(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot.clone()
    }

    pub fn teardown(&self) {
        self.cancel.cancel();
    }
}

pub struct FeedSession<S, N> {
    store: PostStore<S>,
    sink: N,
    load_delay: Duration,
    snapshot_tx: watch::Sender<FeedSnapshot>,
    commands: mpsc::Receiver<FeedCommand>,
    storage_events: broadcast::Receiver<StorageEvent>,
    cancel: CancellationToken,
}

impl<S: KeyValueStorage, N: NotificationSink> FeedSession<S, N> {
    /// Wires a session to the storage-change channel of the hosting
    /// environment and hands the presentation layer its [`FeedHandle`].
    /// Nothing happens until the session future returned by [`Self::run`]
    /// is driven.
    pub fn mount(
        storage: S,
        sink: N,
        storage_events: broadcast::Receiver<StorageEvent>,
        load_delay: Duration,
    ) -> (Self, FeedHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::loading());
        let cancel = CancellationToken::new();

        let session = Self {
            store: PostStore::new(storage),
            sink,
            load_delay,
            snapshot_tx,
            commands: command_rx,
            storage_events,
            cancel: cancel.clone(),
        };
        let handle = FeedHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
            cancel,
        };

        (session, handle)
    }

    /// Runs until torn down. The initial load happens once after the
    /// artificial delay; afterwards every storage-change event for
    /// [`POSTS_KEY`] triggers a full reload. Commands apply synchronously
    /// to completion, so mutations never interleave.
    pub async fn run(mut self) {
        tokio::select! {
            () = self.cancel.cancelled() => return,
            () = sleep(self.load_delay) => {}
        }
        self.reload();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                event = self.storage_events.recv() => match event {
                    Ok(event) if event.key == POSTS_KEY => self.reload(),
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "Storage event subscription lagged, resynchronizing");
                        self.reload();
                    }
                    Err(RecvError::Closed) => break,
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
            }
        }
        // Dropping the session drops the storage event subscription.
    }

    fn reload(&mut self) {
        match self.store.load() {
            Ok(posts) => debug!(count = posts.len(), "Loaded posts"),
            Err(error) => {
                warn!(%error, "Loading posts failed");
                self.sink.notify(NotificationKind::Error, LOAD_FAILED_MESSAGE);
            }
        }
        self.publish();
    }

    fn apply(&mut self, command: FeedCommand) {
        let result = match command {
            FeedCommand::Vote { post_id, kind } => self.store.apply_vote(&post_id, kind),
            FeedCommand::Comment { post_id, comment } => self.store.add_comment(&post_id, comment),
        };
        if let Err(error) = result {
            // Memory already holds the new state; the next persisting
            // operation writes it out again.
            warn!(%error, "Persisting feed mutation failed");
        }
        self.publish();
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send_replace(FeedSnapshot {
            loading: false,
            posts: self.store.posts().to_vec(),
        });
    }
}
