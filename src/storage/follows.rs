use super::schema::{now_millis, Database};
use super::types::{Feed, FeedRow, StoreError};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Follow a feed. Following twice is a unique violation.
    pub async fn follow_feed(&self, user_id: i64, feed_id: i64) -> Result<(), StoreError> {
        let now = now_millis();
        sqlx::query(
            "INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Feeds followed by a user, ordered by name
    pub async fn list_followed_feeds(&self, user_id: i64) -> Result<Vec<Feed>, StoreError> {
        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
                SELECT f.id, f.name, f.url, f.user_id, f.last_fetched_at
                FROM feeds f
                JOIN feed_follows ff ON ff.feed_id = f.id
                WHERE ff.user_id = ?
                ORDER BY f.name, f.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FeedRow::into_feed).collect())
    }

    /// Stop following the feed at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the user does not follow that URL.
    pub async fn unfollow_feed(&self, user_id: i64, url: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM feed_follows
            WHERE user_id = ?
              AND feed_id = (SELECT id FROM feeds WHERE url = ?)
        "#,
        )
        .bind(user_id)
        .bind(url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
