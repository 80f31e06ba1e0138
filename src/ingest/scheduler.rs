use super::error::IngestError;
use super::store::{FeedStore, UserContext};
use crate::storage::StoreError;

/// Picks one feed per cycle: never-fetched feeds first, then the one fetched
/// longest ago.
///
/// Each refresh moves the chosen feed to the back of the queue, so repeated
/// cycles visit every feed in turn.
pub struct FeedScheduler;

impl FeedScheduler {
    /// URL of the feed most overdue for refresh within `user`'s scope.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::NoFeedsAvailable`] when the scope holds no feeds.
    pub async fn next_due<S>(store: &S, user: &UserContext) -> Result<String, IngestError>
    where
        S: FeedStore + ?Sized,
    {
        match store.next_due_feed_url(user).await {
            Ok(url) => Ok(url),
            Err(StoreError::NotFound) => Err(IngestError::NoFeedsAvailable(user.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
