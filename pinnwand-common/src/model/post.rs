//! Stored shape of a community post.
//!
//! Posts live in a string-keyed blob store as a JSON array and have gone
//! through ad hoc shape evolution: older records may lack the vote rosters
//! and the comment list. Defaults are filled here, at the deserialization
//! boundary, and nowhere else.

use crate::model::PostId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

/// Posts older than this (relative to load time) are pruned from memory
/// and from storage on every load cycle.
pub const RETENTION_WINDOW: Duration = Duration::days(30);

/// An opaque comment payload. Only presence and newest-first ordering
/// matter; the content is passed through unchanged.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Comment(Value);

impl Comment {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn get(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for Comment {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub upvotes: u64,
    #[serde(default)]
    pub downvotes: u64,
    #[serde(default)]
    pub upvoted_by: Vec<String>,
    #[serde(default)]
    pub downvoted_by: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Author and content fields are opaque to the store and survive a
    /// round trip byte-for-value.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    #[must_use]
    pub fn created_after(&self, cutoff: OffsetDateTime) -> bool {
        self.created_at > cutoff
    }
}

#[cfg(test)]
mod tests {
    use crate::model::post::{Comment, Post};
    use serde_json::{Value, json};
    use time::macros::datetime;

    #[test]
    fn absent_collections_default_to_empty() {
        let raw = json!({
            "id": "1",
            "createdAt": "2026-08-20T10:00:00Z",
            "upvotes": 3,
            "downvotes": 1
        });

        let post: Post = serde_json::from_value(raw).unwrap();

        assert_eq!(post.upvoted_by, Vec::<String>::new());
        assert_eq!(post.downvoted_by, Vec::<String>::new());
        assert_eq!(post.comments, Vec::<Comment>::new());
        assert_eq!(post.upvotes, 3);
        assert_eq!(post.downvotes, 1);
    }

    #[test]
    fn absent_counters_default_to_zero() {
        let raw = json!({ "id": "1", "createdAt": "2026-08-20T10:00:00Z" });

        let post: Post = serde_json::from_value(raw).unwrap();

        assert_eq!(post.upvotes, 0);
        assert_eq!(post.downvotes, 0);
    }

    #[test]
    fn serialized_posts_use_storage_field_names() {
        let raw = json!({
            "id": "1",
            "createdAt": "2026-08-20T10:00:00Z",
            "upvotes": 0,
            "downvotes": 0,
            "upvotedBy": ["a"],
            "downvotedBy": ["b"],
            "comments": [{"text": "hi"}]
        });

        let post: Post = serde_json::from_value(raw).unwrap();
        assert_eq!(post.created_at, datetime!(2026-08-20 10:00 UTC));

        let out = serde_json::to_value(&post).unwrap();
        assert_eq!(out["upvotedBy"], json!(["a"]));
        assert_eq!(out["downvotedBy"], json!(["b"]));
        assert_eq!(out["comments"], json!([{"text": "hi"}]));
    }

    #[test]
    fn unknown_fields_pass_through_unchanged() {
        let raw = json!({
            "id": "1",
            "createdAt": "2026-08-20T10:00:00Z",
            "title": "Hello",
            "author": { "name": "ada", "avatar": null }
        });

        let post: Post = serde_json::from_value(raw).unwrap();
        assert_eq!(post.extra["title"], Value::String("Hello".to_owned()));

        let out = serde_json::to_value(&post).unwrap();
        assert_eq!(out["title"], json!("Hello"));
        assert_eq!(out["author"], json!({ "name": "ada", "avatar": null }));
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let raw = json!({ "id": "1", "createdAt": "yesterday-ish" });

        assert!(serde_json::from_value::<Post>(raw).is_err());
    }
}
