use thiserror::Error;

use crate::feed::FetchError;
use crate::storage::StoreError;

/// Failures that abort a single ingestion cycle.
///
/// Per-item problems (duplicate URLs, unparseable dates, a rejected insert)
/// never surface here; the pipeline absorbs them.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No feeds available for {0}")]
    NoFeedsAvailable(String),

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The scheduled URL no longer maps to a registered feed
    #[error("Feed {0} is not registered")]
    UnknownFeed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
