//! The feed polling core.
//!
//! [`PollLoop`] ticks on a fixed interval and asks [`IngestionPipeline`] for
//! one cycle per tick. A cycle picks the most overdue feed through
//! [`FeedScheduler`], fetches it, stores each item not seen before, then
//! advances the feed's `last_fetched_at`.
//!
//! Persistence goes through the [`FeedStore`] trait so the core does not
//! depend on a particular database.

mod error;
mod pipeline;
mod poll;
mod scheduler;
mod store;

pub use error::IngestError;
pub use pipeline::{CycleReport, IngestionPipeline, DEFAULT_FETCH_TIMEOUT};
pub use poll::PollLoop;
pub use scheduler::FeedScheduler;
pub use store::{FeedStore, UserContext};
