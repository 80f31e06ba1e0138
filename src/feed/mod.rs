//! Feed retrieval and normalization.
//!
//! - [`fetcher`] - HTTP GET with a deadline and a body size cap
//! - [`parser`] - RSS channel/item extraction with a single entity-unescape pass
//! - [`date`] - Publication date parsing across the layouts feeds actually use

mod date;
mod fetcher;
mod parser;

pub use date::{parse_date, DateError};
pub use fetcher::{build_client, FeedFetcher, FetchError, USER_AGENT};
pub use parser::{parse_feed, unescape_html, FeedDocument, FeedItem, FeedParseError};
