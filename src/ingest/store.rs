use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::{FeedIdentity, InsertOutcome, NewPost, StoreError};

/// Whose feeds are eligible for refresh.
///
/// Passed through the pipeline untouched; only the store interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserContext {
    /// Feeds followed by the named user
    User(String),
    /// Every registered feed
    AllFeeds,
}

impl UserContext {
    pub fn user(name: impl Into<String>) -> Self {
        UserContext::User(name.into())
    }

    pub(crate) fn user_name(&self) -> Option<&str> {
        match self {
            UserContext::User(name) => Some(name),
            UserContext::AllFeeds => None,
        }
    }
}

impl std::fmt::Display for UserContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserContext::User(name) => write!(f, "user '{}'", name),
            UserContext::AllFeeds => f.write_str("all feeds"),
        }
    }
}

/// The persistence operations the ingestion core depends on.
///
/// Implementations must report a missing row as [`StoreError::NotFound`]
/// and a repeated post URL as [`InsertOutcome::DuplicateUrl`].
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// URL of the feed most overdue for refresh within `user`'s scope
    async fn next_due_feed_url(&self, user: &UserContext) -> Result<String, StoreError>;

    /// Resolve a feed URL to its stored identity
    async fn feed_by_url(&self, url: &str) -> Result<FeedIdentity, StoreError>;

    /// Persist a post under `feed_id`
    async fn insert_post(&self, feed_id: i64, post: &NewPost) -> Result<InsertOutcome, StoreError>;

    /// Set the feed's `last_fetched_at`
    async fn mark_fetched(&self, feed_id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;
}
