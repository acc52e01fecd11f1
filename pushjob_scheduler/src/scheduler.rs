use crate::job::Job;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs one job on a fixed interval until cancelled.
///
/// Each invocation runs on the blocking pool and is awaited before the next
/// tick is taken, so calls of the same job never overlap. Ticks missed while
/// a slow call is running are skipped rather than replayed.
pub struct Scheduler {
    job: Job,
    interval: Duration,
}

impl Scheduler {
    pub fn new(job: Job, interval: Duration) -> Self {
        Self { job, interval }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the number of invocations that completed.
    pub async fn run(self, token: CancellationToken) -> u64 {
        info!(
            "Scheduling job '{}' every {:?}",
            self.job.name(),
            self.interval
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut completed = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    break;
                }

                _ = ticker.tick() => {
                    let work = self.job.work();
                    match tokio::task::spawn_blocking(move || work()).await {
                        Ok(value) => {
                            completed += 1;
                            info!(job = %self.job.name(), value, "job ran");
                        }
                        Err(e) => {
                            error!("Job '{}' failed: {}", self.job.name(), e);
                        }
                    }
                }
            }
        }

        info!(
            "Stopped job '{}' after {} invocations",
            self.job.name(),
            completed
        );
        completed
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<u64> {
        tokio::spawn(self.run(token))
    }
}
