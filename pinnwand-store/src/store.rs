//! The post list itself: load, prune, sort, persist, mutate.

use crate::storage::{KeyValueStorage, StorageError};
use pinnwand_common::model::post::{Comment, Post, RETENTION_WINDOW};
use pinnwand_common::model::{PostId, VoteKind};
use thiserror::Error;
use time::OffsetDateTime;

/// The storage key the community feed lives under.
pub const POSTS_KEY: &str = "communityPosts";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Serializing posts failed: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Stored posts could not be parsed: {0}")]
    Parse(#[source] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Owns the in-memory post list and the storage handle it is synchronized
/// with. After a successful [`PostStore::load`], the list is sorted newest
/// first and contains no post older than [`RETENTION_WINDOW`], in memory
/// and in storage.
pub struct PostStore<S> {
    storage: S,
    posts: Vec<Post>,
}

impl<S: KeyValueStorage> PostStore<S> {
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            posts: Vec::new(),
        }
    }

    #[must_use]
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn load(&mut self) -> Result<&[Post], LoadError> {
        self.load_at(OffsetDateTime::now_utc())
    }

    /// Reads the full list from storage, prunes posts older than the
    /// retention window relative to `now`, sorts newest first (ties keep
    /// their stored relative order), and writes the result back under the
    /// same key. An absent key is an empty feed, not an error.
    pub fn load_at(&mut self, now: OffsetDateTime) -> Result<&[Post], LoadError> {
        // A failed load leaves the feed empty, not stale.
        self.posts.clear();

        let stored = self.storage.get(POSTS_KEY)?;
        let mut posts: Vec<Post> = match stored {
            Some(raw) => serde_json::from_str(&raw).map_err(LoadError::Parse)?,
            None => Vec::new(),
        };

        let cutoff = now - RETENTION_WINDOW;
        posts.retain(|post| post.created_after(cutoff));
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.posts = posts;
        // Pruning is persisted, not just filtered for display.
        self.persist()?;

        Ok(&self.posts)
    }

    /// Bumps the matching post's counter and persists the full list. The
    /// vote rosters are carried through storage untouched and never
    /// consulted, so repeat votes by the same account stack.
    pub fn apply_vote(&mut self, post_id: &PostId, kind: VoteKind) -> Result<(), PersistError> {
        if let Some(post) = self.posts.iter_mut().find(|post| post.id == *post_id) {
            match kind {
                VoteKind::Upvote => post.upvotes = post.upvotes.saturating_add(1),
                VoteKind::Downvote => post.downvotes = post.downvotes.saturating_add(1),
            }
        }
        self.persist()
    }

    /// Prepends `comment` to the matching post (comments are newest first)
    /// and persists the full list. An unknown `post_id` is a no-op.
    pub fn add_comment(&mut self, post_id: &PostId, comment: Comment) -> Result<(), PersistError> {
        if let Some(post) = self.posts.iter_mut().find(|post| post.id == *post_id) {
            post.comments.insert(0, comment);
        }
        self.persist()
    }

    fn persist(&self) -> Result<(), PersistError> {
        let raw = serde_json::to_string(&self.posts).map_err(PersistError::Serialize)?;
        self.storage.set(POSTS_KEY, &raw)?;
        Ok(())
    }
}
