use super::schema::{now_millis, Database};
use super::types::{InsertOutcome, NewPost, Post, PostRow, StoreError};

/// Maximum number of posts returned by a single browse query
const MAX_POSTS: i64 = 1000;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post for `feed_id`.
    ///
    /// A post whose URL is already stored yields [`InsertOutcome::DuplicateUrl`]
    /// instead of an error; feeds republish the same items on every poll.
    pub async fn insert_post(
        &self,
        feed_id: i64,
        post: &NewPost,
    ) -> Result<InsertOutcome, StoreError> {
        let now = now_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at.timestamp_millis())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(e) => {
                let err = StoreError::from_sqlx(e);
                if err.is_unique_violation() {
                    Ok(InsertOutcome::DuplicateUrl)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Newest posts from feeds followed by `user_id`
    pub async fn get_posts_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Post>, StoreError> {
        let limit = limit.clamp(0, MAX_POSTS);
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.feed_id, f.name AS feed_name, p.title, p.url, p.description,
                   p.published_at, p.created_at
            FROM posts p
            JOIN feeds f ON f.id = p.feed_id
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC, p.id DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }

    /// Number of posts stored for a feed
    pub async fn count_posts_for_feed(&self, feed_id: i64) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
