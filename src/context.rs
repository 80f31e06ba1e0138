use std::path::PathBuf;

use crate::config::{Config, ConfigError};
use crate::feed::build_client;
use crate::storage::{Database, StoreError};

/// Environment variable that overrides `db_url` from the config file
pub const DB_URL_ENV: &str = "GATOR_DB_URL";

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to open database: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Everything a command needs: the loaded config, the open database and the
/// shared HTTP client.
///
/// Built once at startup and handed to each command. Call [`AppContext::close`]
/// before exiting so pooled connections shut down cleanly.
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub db: Database,
    pub http: reqwest::Client,
}

impl AppContext {
    /// Load the config at `config_path` and open the database it names.
    ///
    /// `db_override` (usually from [`DB_URL_ENV`]) wins over the file's `db_url`
    /// for this run only; it is never written back to the file.
    pub async fn open(
        config_path: PathBuf,
        db_override: Option<String>,
    ) -> Result<Self, ContextError> {
        let config = Config::load(&config_path)?;
        let db_url = db_override
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| config.db_url.clone());

        let db = Database::open(&db_url).await?;
        let http = build_client()?;
        tracing::debug!(config = %config_path.display(), db = %db_url, "Context ready");

        Ok(Self {
            config,
            config_path,
            db,
            http,
        })
    }

    /// Persist `name` as the current user
    pub fn set_current_user(&mut self, name: &str) -> Result<(), ConfigError> {
        self.config.set_user(name, &self.config_path)
    }

    pub async fn close(self) {
        self.db.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_uses_override_and_persists_user() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("gator.json");

        let mut ctx = AppContext::open(config_path.clone(), Some(":memory:".into()))
            .await
            .unwrap();
        ctx.set_current_user("alice").unwrap();
        ctx.close().await;

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.current_user.as_deref(), Some("alice"));
        assert_eq!(config.db_url, Config::default().db_url);
    }

    #[tokio::test]
    async fn test_open_creates_database_from_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("gator.json");
        let db_path = dir.path().join("data").join("gator.db");
        Config {
            db_url: db_path.display().to_string(),
            current_user: None,
        }
        .save(&config_path)
        .unwrap();

        let ctx = AppContext::open(config_path, None).await.unwrap();
        ctx.close().await;
        assert!(db_path.exists());
    }
}
