//! Batch scheduler
//!
//! This module handles:
//! - Draining the job queue in batches of a randomized size
//! - Running every job of a batch concurrently and waiting for all of them
//! - Pausing a randomized delay between batches
//!
//! The scheduler is the only consumer of the queue and runs as one background
//! task per dispatcher. Aborting that task is its normal way out.

use crate::dispatch::job::Job;
use crate::dispatch::pacing::Pacing;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, trace, warn};

/// Counters describing what the scheduler has done so far
#[derive(Debug, Default)]
pub struct SchedulerStats {
    batches: AtomicU64,
    jobs: AtomicU64,
    panicked: AtomicU64,
    last_batch_len: AtomicUsize,
    last_delay_ms: AtomicU64,
}

impl SchedulerStats {
    /// Number of batches executed
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Number of jobs executed across all batches
    pub fn jobs(&self) -> u64 {
        self.jobs.load(Ordering::Relaxed)
    }

    /// Number of jobs that panicked instead of resolving their handle
    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    /// Number of jobs in the most recent batch
    pub fn last_batch_len(&self) -> usize {
        self.last_batch_len.load(Ordering::Relaxed)
    }

    /// Delay drawn after the most recent batch
    pub fn last_delay(&self) -> Duration {
        Duration::from_millis(self.last_delay_ms.load(Ordering::Relaxed))
    }

    fn record_batch(&self, len: usize, panicked: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.jobs.fetch_add(len as u64, Ordering::Relaxed);
        self.panicked.fetch_add(panicked, Ordering::Relaxed);
        self.last_batch_len.store(len, Ordering::Relaxed);
    }

    fn record_delay(&self, delay: Duration) {
        self.last_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }
}

/// Jobs accumulated during one cycle
struct Batch {
    jobs: Vec<Job>,

    /// Every sender is gone; no more jobs can arrive
    queue_closed: bool,
}

/// Single consumer of a dispatcher's job queue
pub(crate) struct Scheduler {
    name: &'static str,
    queue: mpsc::UnboundedReceiver<Job>,
    pacing: Pacing,
    batch_size: Arc<AtomicUsize>,
    stats: Arc<SchedulerStats>,
}

impl Scheduler {
    pub(crate) fn new(
        name: &'static str,
        queue: mpsc::UnboundedReceiver<Job>,
        pacing: Pacing,
        batch_size: Arc<AtomicUsize>,
        stats: Arc<SchedulerStats>,
    ) -> Self {
        Self {
            name,
            queue,
            pacing,
            batch_size,
            stats,
        }
    }

    /// Runs scheduler cycles until the task is aborted or the queue closes
    pub(crate) async fn run(mut self) {
        debug!(dispatcher = self.name, "Scheduler started");

        loop {
            let size = self.batch_size.load(Ordering::Relaxed);
            let batch = self.collect_batch(size).await;

            if !batch.jobs.is_empty() {
                let len = batch.jobs.len();
                let panicked = run_batch(self.name, batch.jobs).await;
                self.stats.record_batch(len, panicked);

                let next_size = self.pacing.roll_batch_size(&mut rand::rng());
                self.batch_size.store(next_size, Ordering::Relaxed);

                if batch.queue_closed {
                    break;
                }

                let delay = self.pacing.roll_delay(&mut rand::rng());
                self.stats.record_delay(delay);
                debug!(
                    dispatcher = self.name,
                    jobs = len,
                    next_batch_size = next_size,
                    delay_ms = delay.as_millis() as u64,
                    "Batch complete"
                );
                sleep(delay).await;
            } else if batch.queue_closed {
                break;
            }
        }

        debug!(dispatcher = self.name, "Job queue closed, scheduler exiting");
    }

    /// Pulls up to `size` jobs, giving up on the first pull that times out
    async fn collect_batch(&mut self, size: usize) -> Batch {
        let mut jobs = Vec::with_capacity(size);

        for _ in 0..size {
            match timeout(self.pacing.pull_timeout, self.queue.recv()).await {
                Ok(Some(job)) => jobs.push(job),
                Ok(None) => {
                    return Batch {
                        jobs,
                        queue_closed: true,
                    }
                }
                Err(_) => {
                    trace!(
                        dispatcher = self.name,
                        collected = jobs.len(),
                        "Queue pull timed out"
                    );
                    sleep(self.pacing.idle_pause).await;
                    break;
                }
            }
        }

        Batch {
            jobs,
            queue_closed: false,
        }
    }
}

/// Runs every job concurrently and waits for all of them
///
/// Jobs report their own failures through their result handles. A panic is
/// contained in its task; the count of panicked jobs is returned.
async fn run_batch(name: &'static str, jobs: Vec<Job>) -> u64 {
    let mut running = JoinSet::new();
    for job in jobs {
        running.spawn(job);
    }

    let mut panicked = 0;
    while let Some(joined) = running.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                panicked += 1;
                warn!(dispatcher = name, "Job panicked; its result handle is abandoned");
            }
        }
    }

    panicked
}
