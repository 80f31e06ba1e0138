use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::feed::parser::{parse_feed, FeedDocument};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Identifier sent as `User-Agent` on every feed request
pub const USER_AGENT: &str = "gator";

/// Errors that can occur while retrieving a feed.
///
/// Nothing here is retried; the caller decides what a failure means.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, timeout, truncated body)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Response status outside 2xx. Redirects that reach this layer count as failures.
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Body is not a well-formed RSS document
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Build the shared HTTP client used for feed requests.
///
/// Redirects are not followed, so a 3xx surfaces as [`FetchError::HttpStatus`].
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Retrieves and parses RSS feeds over HTTP.
#[derive(Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// GET `url` and parse the body as RSS.
    ///
    /// `timeout` bounds the whole exchange, body included. Exceeding it
    /// yields [`FetchError::Network`].
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] - Transport failure or timeout
    /// - [`FetchError::HttpStatus`] - Status code of 300 or above
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded 10MB
    /// - [`FetchError::Parse`] - Body is not well-formed RSS
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<FeedDocument, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(feed = %url, status = %status, "Feed request rejected");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
        let body = String::from_utf8_lossy(&bytes);

        let document = parse_feed(&body).map_err(|e| FetchError::Parse(e.to_string()))?;
        tracing::debug!(
            feed = %url,
            title = %document.title,
            items = document.items.len(),
            "Fetched feed"
        );
        Ok(document)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
