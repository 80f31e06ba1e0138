use chrono::Utc;
use std::time::Duration;

use super::error::IngestError;
use super::scheduler::FeedScheduler;
use super::store::{FeedStore, UserContext};
use crate::feed::{parse_date, FeedFetcher, FeedItem};
use crate::storage::{InsertOutcome, NewPost, StoreError};

/// Default deadline for a single feed request
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Summary of one completed ingestion cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub feed_name: String,
    pub feed_url: String,
    /// Items present in the fetched document
    pub items_seen: usize,
    /// Items stored for the first time during this cycle
    pub items_inserted: usize,
    /// Titles of every item in document order
    pub titles: Vec<String>,
}

/// Runs one feed through schedule, fetch, persist and timestamp update.
pub struct IngestionPipeline<S> {
    store: S,
    fetcher: FeedFetcher,
    timeout: Duration,
}

impl<S: FeedStore> IngestionPipeline<S> {
    pub fn new(store: S, fetcher: FeedFetcher) -> Self {
        Self {
            store,
            fetcher,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Override the per-request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Refresh the single most overdue feed in `user`'s scope.
    ///
    /// A failed fetch leaves the feed's `last_fetched_at` untouched, so the
    /// same feed is picked again next cycle. Once the fetch succeeds the
    /// timestamp is always advanced, even if no item could be stored.
    ///
    /// # Errors
    ///
    /// - [`IngestError::NoFeedsAvailable`] - Nothing to refresh
    /// - [`IngestError::Fetch`] - Transport, status or parse failure
    /// - [`IngestError::UnknownFeed`] - The URL was unregistered mid-cycle
    /// - [`IngestError::Store`] - Scheduling or the final timestamp update failed
    pub async fn run_one_cycle(&self, user: &UserContext) -> Result<CycleReport, IngestError> {
        let url = FeedScheduler::next_due(&self.store, user).await?;
        tracing::debug!(feed = %url, scope = %user, "Selected feed for refresh");

        let document = self
            .fetcher
            .fetch(&url, self.timeout)
            .await
            .map_err(|source| IngestError::Fetch {
                url: url.clone(),
                source,
            })?;

        let feed = match self.store.feed_by_url(&url).await {
            Ok(feed) => feed,
            Err(StoreError::NotFound) => return Err(IngestError::UnknownFeed(url)),
            Err(e) => return Err(e.into()),
        };

        let mut items_inserted = 0;
        for item in &document.items {
            if self.ingest_item(feed.id, item).await {
                items_inserted += 1;
            }
        }

        self.store.mark_fetched(feed.id, Utc::now()).await?;

        let report = CycleReport {
            feed_name: feed.name,
            feed_url: url,
            items_seen: document.items.len(),
            items_inserted,
            titles: document.items.into_iter().map(|item| item.title).collect(),
        };
        tracing::info!(
            feed = %report.feed_name,
            seen = report.items_seen,
            inserted = report.items_inserted,
            "Feed refreshed"
        );
        Ok(report)
    }

    /// Store one item. Returns true only when a new post was created.
    async fn ingest_item(&self, feed_id: i64, item: &FeedItem) -> bool {
        let published_at = parse_date(&item.pub_date).unwrap_or_else(|e| {
            tracing::debug!(title = %item.title, error = %e, "Using current time as publication date");
            Utc::now()
        });

        let post = NewPost {
            title: item.title.clone(),
            url: item.link.clone(),
            description: item.description.clone(),
            published_at,
        };

        match self.store.insert_post(feed_id, &post).await {
            Ok(InsertOutcome::Created) => true,
            Ok(InsertOutcome::DuplicateUrl) => false,
            Err(e) => {
                tracing::warn!(title = %item.title, url = %item.link, error = %e, "Failed to save post");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{build_client, FetchError};
    use crate::storage::{Database, FeedIdentity};
    use async_trait::async_trait;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss(items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, link)| {
                format!(
                    "<item><title>{title}</title><link>{link}</link>\
                     <description>d</description>\
                     <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate></item>"
                )
            })
            .collect();
        format!(
            "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel>\
             <title>T</title><link>https://example.com</link>\
             <description>D</description>{body}</channel></rss>"
        )
    }

    async fn serve(server: &MockServer, route: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn db_with_feed(url: &str) -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("alice").await.unwrap();
        let feed = db.create_feed(user.id, "Example", url).await.unwrap();
        db.follow_feed(user.id, feed.id).await.unwrap();
        (db, feed.id)
    }

    fn pipeline<S: FeedStore>(store: S) -> IngestionPipeline<S> {
        IngestionPipeline::new(store, FeedFetcher::new(build_client().unwrap()))
            .with_timeout(Duration::from_secs(5))
    }

    fn five_items() -> Vec<(&'static str, &'static str)> {
        vec![
            ("One", "https://example.com/1"),
            ("Two", "https://example.com/2"),
            ("Three", "https://example.com/3"),
            ("Four", "https://example.com/4"),
            ("Five", "https://example.com/5"),
        ]
    }

    #[tokio::test]
    async fn test_counts_only_new_posts() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 200, rss(&five_items())).await;
        let url = format!("{}/feed", server.uri());
        let (db, feed_id) = db_with_feed(&url).await;

        for link in ["https://example.com/2", "https://example.com/4"] {
            let post = NewPost {
                title: "seen".into(),
                url: link.into(),
                description: String::new(),
                published_at: Utc::now(),
            };
            db.insert_post(feed_id, &post).await.unwrap();
        }

        let report = pipeline(db.clone())
            .run_one_cycle(&UserContext::user("alice"))
            .await
            .unwrap();
        assert_eq!(report.feed_name, "Example");
        assert_eq!(report.items_seen, 5);
        assert_eq!(report.items_inserted, 3);
        assert_eq!(report.titles, vec!["One", "Two", "Three", "Four", "Five"]);
        assert_eq!(db.count_posts_for_feed(feed_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_second_cycle_inserts_nothing() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 200, rss(&five_items())).await;
        let url = format!("{}/feed", server.uri());
        let (db, feed_id) = db_with_feed(&url).await;
        let pipeline = pipeline(db.clone());
        let ctx = UserContext::user("alice");

        let first = pipeline.run_one_cycle(&ctx).await.unwrap();
        let second = pipeline.run_one_cycle(&ctx).await.unwrap();
        assert_eq!(first.items_inserted, 5);
        assert_eq!(second.items_seen, 5);
        assert_eq!(second.items_inserted, 0);
        assert_eq!(db.count_posts_for_feed(feed_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_http_error_leaves_timestamp_unchanged() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 404, String::new()).await;
        let url = format!("{}/feed", server.uri());
        let (db, _) = db_with_feed(&url).await;

        let err = pipeline(db.clone())
            .run_one_cycle(&UserContext::user("alice"))
            .await
            .unwrap_err();
        match err {
            IngestError::Fetch {
                source: FetchError::HttpStatus(404),
                ..
            } => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
        let feed = db.get_feed_by_url(&url).await.unwrap();
        assert_eq!(feed.last_fetched_at, None);
    }

    #[tokio::test]
    async fn test_empty_feed_still_marks_fetched() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 200, rss(&[])).await;
        let url = format!("{}/feed", server.uri());
        let (db, _) = db_with_feed(&url).await;

        let before = Utc::now();
        let report = pipeline(db.clone())
            .run_one_cycle(&UserContext::AllFeeds)
            .await
            .unwrap();
        assert_eq!(report.items_seen, 0);
        assert_eq!(report.items_inserted, 0);

        let fetched = db.get_feed_by_url(&url).await.unwrap().last_fetched_at;
        assert!(fetched.is_some_and(|t| t.timestamp_millis() >= before.timestamp_millis()));
    }

    #[tokio::test]
    async fn test_entities_unescaped_once_before_storage() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/feed",
            200,
            rss(&[("&amp;amp;Example&amp;amp;", "https://example.com/e")]),
        )
        .await;
        let url = format!("{}/feed", server.uri());
        let (db, _) = db_with_feed(&url).await;
        let user = db.get_user("alice").await.unwrap();

        pipeline(db.clone())
            .run_one_cycle(&UserContext::user("alice"))
            .await
            .unwrap();
        let posts = db.get_posts_for_user(user.id, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "&Example&");
    }

    #[tokio::test]
    async fn test_no_feeds_available() {
        let db = Database::open(":memory:").await.unwrap();
        db.create_user("alice").await.unwrap();
        let err = pipeline(db)
            .run_one_cycle(&UserContext::user("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NoFeedsAvailable(_)));
    }

    /// Store double that records calls and can be told to misbehave
    struct MockStore {
        url: String,
        registered: bool,
        reject_url: Option<String>,
        inserted: Mutex<Vec<NewPost>>,
        marked: Mutex<Vec<(i64, DateTime<Utc>)>>,
    }

    impl MockStore {
        fn new(url: String) -> Self {
            Self {
                url,
                registered: true,
                reject_url: None,
                inserted: Mutex::new(Vec::new()),
                marked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl FeedStore for MockStore {
        async fn next_due_feed_url(&self, _user: &UserContext) -> Result<String, StoreError> {
            Ok(self.url.clone())
        }

        async fn feed_by_url(&self, _url: &str) -> Result<FeedIdentity, StoreError> {
            if self.registered {
                Ok(FeedIdentity {
                    id: 7,
                    name: "Mock".into(),
                })
            } else {
                Err(StoreError::NotFound)
            }
        }

        async fn insert_post(
            &self,
            _feed_id: i64,
            post: &NewPost,
        ) -> Result<InsertOutcome, StoreError> {
            if self.reject_url.as_deref() == Some(post.url.as_str()) {
                return Err(StoreError::Migration("disk full".into()));
            }
            self.inserted.lock().unwrap().push(post.clone());
            Ok(InsertOutcome::Created)
        }

        async fn mark_fetched(&self, feed_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
            self.marked.lock().unwrap().push((feed_id, at));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_persistence_error_skips_only_that_item() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 200, rss(&five_items())).await;
        let mut store = MockStore::new(format!("{}/feed", server.uri()));
        store.reject_url = Some("https://example.com/3".into());

        let pipeline = pipeline(store);
        let report = pipeline
            .run_one_cycle(&UserContext::AllFeeds)
            .await
            .unwrap();
        assert_eq!(report.items_seen, 5);
        assert_eq!(report.items_inserted, 4);

        let urls: Vec<String> = pipeline
            .store()
            .inserted
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.url.clone())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/4",
                "https://example.com/5",
            ]
        );
        assert_eq!(pipeline.store().marked.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_date_falls_back_to_now() {
        let server = MockServer::start().await;
        let body = "<rss><channel><title>T</title>\
                    <item><title>A</title><link>https://example.com/a</link>\
                    <pubDate>not-a-date</pubDate></item></channel></rss>";
        serve(&server, "/feed", 200, body.to_string()).await;
        let pipeline = pipeline(MockStore::new(format!("{}/feed", server.uri())));

        let before = Utc::now();
        let report = pipeline
            .run_one_cycle(&UserContext::AllFeeds)
            .await
            .unwrap();
        assert_eq!(report.items_inserted, 1);
        let inserted = pipeline.store().inserted.lock().unwrap();
        assert!(inserted[0].published_at >= before);
    }

    #[tokio::test]
    async fn test_unknown_feed_is_not_marked() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 200, rss(&five_items())).await;
        let url = format!("{}/feed", server.uri());
        let mut store = MockStore::new(url.clone());
        store.registered = false;

        let pipeline = pipeline(store);
        let err = pipeline
            .run_one_cycle(&UserContext::AllFeeds)
            .await
            .unwrap_err();
        match err {
            IngestError::UnknownFeed(u) => assert_eq!(u, url),
            other => panic!("Expected UnknownFeed, got {:?}", other),
        }
        assert!(pipeline.store().inserted.lock().unwrap().is_empty());
        assert!(pipeline.store().marked.lock().unwrap().is_empty());
    }
}
