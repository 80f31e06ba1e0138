use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{FeedIdentity, InsertOutcome, NewPost, StoreError};
use crate::ingest::{FeedStore, UserContext};

#[async_trait]
impl FeedStore for Database {
    async fn next_due_feed_url(&self, user: &UserContext) -> Result<String, StoreError> {
        let feed = self.next_feed_to_fetch(user.user_name()).await?;
        Ok(feed.url)
    }

    async fn feed_by_url(&self, url: &str) -> Result<FeedIdentity, StoreError> {
        let feed = self.get_feed_by_url(url).await?;
        Ok(FeedIdentity {
            id: feed.id,
            name: feed.name,
        })
    }

    async fn insert_post(&self, feed_id: i64, post: &NewPost) -> Result<InsertOutcome, StoreError> {
        Database::insert_post(self, feed_id, post).await
    }

    async fn mark_fetched(&self, feed_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.mark_feed_fetched(feed_id, at).await
    }
}
