use std::time::Duration;

use tokio::select;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pipeline::{CycleReport, IngestionPipeline};
use super::store::{FeedStore, UserContext};

/// Drives [`IngestionPipeline::run_one_cycle`] on a fixed period until cancelled.
pub struct PollLoop<S> {
    pipeline: IngestionPipeline<S>,
}

impl<S: FeedStore> PollLoop<S> {
    pub fn new(pipeline: IngestionPipeline<S>) -> Self {
        Self { pipeline }
    }

    /// Run cycles every `interval`, starting immediately.
    ///
    /// Cycle errors are logged and the loop keeps going. `on_report` sees
    /// every successful cycle. Returns the number of cycles attempted once
    /// `cancel` fires.
    pub async fn run<F>(
        &self,
        interval: Duration,
        user: &UserContext,
        cancel: CancellationToken,
        mut on_report: F,
    ) -> u64
    where
        F: FnMut(&CycleReport),
    {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0;

        info!(interval = ?interval, scope = %user, "Collecting feeds");

        loop {
            select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Received a cancellation signal; exiting");
                    break;
                }

                _ = ticker.tick() => {
                    cycles += 1;
                    select! {
                        biased;

                        _ = cancel.cancelled() => {
                            debug!("Cancelled mid-cycle; exiting");
                            break;
                        }

                        result = self.pipeline.run_one_cycle(user) => match result {
                            Ok(report) => on_report(&report),
                            Err(e) => warn!(error = %e, "Feed cycle failed"),
                        },
                    }
                }
            }
        }

        cycles
    }
}
