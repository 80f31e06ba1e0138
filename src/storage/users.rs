use super::schema::{now_millis, Database};
use super::types::{StoreError, User, UserRow};

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a user. Fails with a unique violation if the name is taken.
    pub async fn create_user(&self, name: &str) -> Result<User, StoreError> {
        let now = now_millis();
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (name, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING id, name, created_at
        "#,
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_user())
    }

    /// Look up a user by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no user has that name.
    pub async fn get_user(&self, name: &str) -> Result<User, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, name, created_at FROM users WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        row.map(UserRow::into_user).ok_or(StoreError::NotFound)
    }

    /// All users ordered by name
    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT id, name, created_at FROM users ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(UserRow::into_user).collect())
    }

    /// Delete every user. Feeds, follows and posts go with them via cascade.
    pub async fn reset_users(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, StoreError};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = test_db().await;
        let created = db.create_user("alice").await.unwrap();
        let fetched = db.get_user("alice").await.unwrap();
        assert_eq!(created, fetched);
    }

    #[tokio::test]
    async fn test_get_missing_user_is_not_found() {
        let db = test_db().await;
        assert!(matches!(
            db.get_user("nobody").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_user_is_unique_violation() {
        let db = test_db().await;
        db.create_user("alice").await.unwrap();
        let err = db.create_user("alice").await.unwrap_err();
        assert!(err.is_unique_violation(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_list_users_sorted() {
        let db = test_db().await;
        db.create_user("carol").await.unwrap();
        db.create_user("alice").await.unwrap();
        let names: Vec<String> = db
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn test_reset_cascades_to_feeds() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        db.create_feed(user.id, "Blog", "https://example.com/rss")
            .await
            .unwrap();

        assert_eq!(db.reset_users().await.unwrap(), 1);
        assert!(db.list_users().await.unwrap().is_empty());
        assert!(db.list_feeds().await.unwrap().is_empty());
    }
}
