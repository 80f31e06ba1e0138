use chrono::{DateTime, Utc};

use super::schema::{now_millis, Database};
use super::types::{Feed, FeedRow, FeedWithOwner, FeedWithOwnerRow, StoreError};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a new feed owned by `user_id`. The URL must be unique.
    pub async fn create_feed(&self, user_id: i64, name: &str, url: &str) -> Result<Feed, StoreError> {
        let now = now_millis();
        let row: FeedRow = sqlx::query_as(
            r#"
            INSERT INTO feeds (name, url, user_id, created_at, updated_at, last_fetched_at)
            VALUES (?, ?, ?, ?, ?, NULL)
            RETURNING id, name, url, user_id, last_fetched_at
        "#,
        )
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_feed())
    }

    /// All feeds with the name of the user who added them
    pub async fn list_feeds(&self) -> Result<Vec<FeedWithOwner>, StoreError> {
        let rows: Vec<FeedWithOwnerRow> = sqlx::query_as(
            r#"
                SELECT f.id, f.name, f.url, f.user_id, f.last_fetched_at, u.name
                FROM feeds f
                JOIN users u ON u.id = f.user_id
                ORDER BY f.name, f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let feeds = rows
            .into_iter()
            .map(|(id, name, url, user_id, last_fetched_at, owner)| FeedWithOwner {
                feed: FeedRow {
                    id,
                    name,
                    url,
                    user_id,
                    last_fetched_at,
                }
                .into_feed(),
                owner,
            })
            .collect();

        Ok(feeds)
    }

    /// Look up a feed by its URL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the URL is not registered.
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Feed, StoreError> {
        let row: Option<FeedRow> = sqlx::query_as(
            "SELECT id, name, url, user_id, last_fetched_at FROM feeds WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(FeedRow::into_feed).ok_or(StoreError::NotFound)
    }

    /// Feed owned by `user_id` with the given display name, if any
    pub async fn find_user_feed_by_name(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Option<Feed>, StoreError> {
        let row: Option<FeedRow> = sqlx::query_as(
            "SELECT id, name, url, user_id, last_fetched_at FROM feeds WHERE user_id = ? AND name = ?",
        )
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FeedRow::into_feed))
    }

    /// The feed most overdue for refresh among those followed by `user_name`,
    /// or among all feeds when `user_name` is `None`.
    ///
    /// Never-fetched feeds come first, then the oldest `last_fetched_at`;
    /// ties fall back to the feed id so the choice is deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when there is no candidate feed.
    pub async fn next_feed_to_fetch(&self, user_name: Option<&str>) -> Result<Feed, StoreError> {
        let row: Option<FeedRow> = match user_name {
            Some(name) => {
                sqlx::query_as(
                    r#"
                    SELECT f.id, f.name, f.url, f.user_id, f.last_fetched_at
                    FROM feeds f
                    JOIN feed_follows ff ON ff.feed_id = f.id
                    JOIN users u ON u.id = ff.user_id
                    WHERE u.name = ?
                    ORDER BY f.last_fetched_at IS NOT NULL, f.last_fetched_at ASC, f.id ASC
                    LIMIT 1
                "#,
                )
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, name, url, user_id, last_fetched_at
                    FROM feeds
                    ORDER BY last_fetched_at IS NOT NULL, last_fetched_at ASC, id ASC
                    LIMIT 1
                "#,
                )
                .fetch_optional(&self.pool)
                .await?
            }
        };
        row.map(FeedRow::into_feed).ok_or(StoreError::NotFound)
    }

    /// Record a completed fetch cycle for a feed
    pub async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
            .bind(fetched_at.timestamp_millis())
            .bind(now_millis())
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
