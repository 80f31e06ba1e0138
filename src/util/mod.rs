//! Small helpers shared by the command layer.
//!
//! - **Durations**: `30s`, `1m`, `1h30m` style intervals for `agg`
//! - **Text**: terminal-safe rendering of remote feed text
//! - **URLs**: http/https validation for `addfeed`

mod duration;
mod text;
mod url_validator;

pub use duration::{parse_duration, DurationError};
pub use text::strip_control_chars;
pub use url_validator::{validate_feed_url, UrlValidationError};
