//! The delete queue and its single consumer.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::sync::mpsc;

use crate::dispatch::message_info::MsgInfo;
use crate::platform::{DeleteOutcome, Platform};

/// One message scheduled for deletion. Consumed exactly once by the worker.
#[derive(Debug, Clone)]
pub struct DeleteJob {
    target: MsgInfo,
    batch: Arc<Batch>,
}

impl DeleteJob {
    pub fn new(target: MsgInfo, batch: Arc<Batch>) -> Self {
        DeleteJob { target, batch }
    }

    pub fn target(&self) -> &MsgInfo {
        &self.target
    }
}

/// Tally of one mitigation's deletions. The worker reports it once its last job resolves: to
/// `report_to` if set, otherwise as a transient notice in `origin`.
#[derive(Debug)]
pub struct Batch {
    guild: GuildId,
    user: UserId,
    origin: ChannelId,
    report_to: Option<ChannelId>,
    remaining: AtomicUsize,
    deleted: AtomicUsize,
    already_gone: AtomicUsize,
    forbidden: AtomicUsize,
    failed: AtomicUsize,
}

/// Final counts for a batch.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub deleted: usize,
    pub already_gone: usize,
    pub forbidden: usize,
    pub failed: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} deleted, {} failed", self.deleted, self.failed)?;
        if self.already_gone > 0 || self.forbidden > 0 {
            write!(f, " ({} already gone, {} not permitted)", self.already_gone, self.forbidden)?;
        }
        Ok(())
    }
}

impl Batch {
    pub fn new(guild: GuildId, user: UserId, size: usize, origin: ChannelId, report_to: Option<ChannelId>) -> Arc<Self> {
        Arc::new(Batch {
            guild,
            user,
            origin,
            report_to,
            remaining: AtomicUsize::new(size),
            deleted: Default::default(),
            already_gone: Default::default(),
            forbidden: Default::default(),
            failed: Default::default(),
        })
    }

    /// Counts one resolved job. Returns the summary if it was the last one.
    fn record(&self, outcome: DeleteOutcome) -> Option<BatchSummary> {
        let counter = match outcome {
            DeleteOutcome::Success => &self.deleted,
            DeleteOutcome::AlreadyGone => &self.already_gone,
            DeleteOutcome::Forbidden => &self.forbidden,
            DeleteOutcome::Transient(_) | DeleteOutcome::Fatal => &self.failed,
        };
        counter.fetch_add(1, Ordering::AcqRel);

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            Some(self.summary())
        } else {
            None
        }
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            deleted: self.deleted.load(Ordering::Acquire),
            already_gone: self.already_gone.load(Ordering::Acquire),
            forbidden: self.forbidden.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

/// Lifetime counters, shown by `spam stats`.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub queued: AtomicU64,
    pub deleted: AtomicU64,
    pub already_gone: AtomicU64,
    pub forbidden: AtomicU64,
    pub failed: AtomicU64,
}

impl WorkerStats {
    fn record(&self, outcome: DeleteOutcome) {
        let counter = match outcome {
            DeleteOutcome::Success => &self.deleted,
            DeleteOutcome::AlreadyGone => &self.already_gone,
            DeleteOutcome::Forbidden => &self.forbidden,
            DeleteOutcome::Transient(_) | DeleteOutcome::Fatal => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Jobs queued but not resolved yet.
    pub fn pending(&self) -> u64 {
        let done = self.deleted.load(Ordering::Relaxed)
            + self.already_gone.load(Ordering::Relaxed)
            + self.forbidden.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed);
        self.queued.load(Ordering::Relaxed).saturating_sub(done)
    }
}

/// Pacing for the worker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Attempts per job, including the first.
    pub max_attempts: usize,
    /// Wait after a rate limit without a server-provided delay.
    pub default_retry_after: Duration,
    /// Pause after every job.
    pub job_interval: Duration,
    /// How long a summary posted in the triggering channel stays up.
    pub summary_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            max_attempts: 3,
            default_retry_after: Duration::from_secs(5),
            job_interval: Duration::from_secs(1),
            summary_ttl: Duration::from_secs(30),
        }
    }
}

/// Producer side of the delete queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeleteQueue {
    tx: mpsc::UnboundedSender<DeleteJob>,
    stats: Arc<WorkerStats>,
}

impl_err!(DeleteQueueClosed, "The delete queue has shut down.", false);

impl DeleteQueue {
    /// Creates a queue along with the worker which drains it.
    pub fn new(platform: Arc<dyn Platform>, config: WorkerConfig) -> (DeleteQueue, DeleteWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(WorkerStats::default());
        let queue = DeleteQueue { tx, stats: stats.clone() };
        let worker = DeleteWorker { rx, platform, stats, config };
        (queue, worker)
    }

    pub fn push(&self, job: DeleteJob) -> crate::error::Result<()> {
        self.tx.send(job).map_err(|_| DeleteQueueClosed)?;
        self.stats.queued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }
}

/// Drains the delete queue one job at a time until every producer is gone.
pub struct DeleteWorker {
    rx: mpsc::UnboundedReceiver<DeleteJob>,
    platform: Arc<dyn Platform>,
    stats: Arc<WorkerStats>,
    config: WorkerConfig,
}

impl DeleteWorker {
    pub async fn run(mut self) {
        info!("delete worker started");
        while let Some(job) = self.rx.recv().await {
            self.handle(job).await;
            tokio::time::sleep(self.config.job_interval).await;
        }
        info!("delete queue closed, worker stopping");
    }

    /// Resolves one job. Every job is counted exactly once, even if deleting it panics.
    async fn handle(&self, job: DeleteJob) {
        let outcome = AssertUnwindSafe(self.attempt(job.target()))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!("deleting {} panicked; counting it as failed", job.target.msg);
                DeleteOutcome::Fatal
            });

        self.stats.record(outcome);
        if let Some(summary) = job.batch.record(outcome) {
            if AssertUnwindSafe(self.report(&job.batch, summary)).catch_unwind().await.is_err() {
                error!("reporting a cleanup summary panicked");
            }
        }
    }

    async fn report(&self, batch: &Batch, summary: BatchSummary) {
        info!(guild = %batch.guild, user = %batch.user, "spam cleanup finished: {}", summary);
        let text = format!("Spam cleanup for <@{}>: {}.", batch.user, summary);
        let res = match batch.report_to {
            Some(ch) => self.platform.send(ch, text).await.map(|_| ()),
            None => self.platform.send_transient(batch.origin, text, self.config.summary_ttl).await,
        };
        if let Err(e) = res {
            warn!("couldn't post cleanup summary for {}: {}", batch.user, e);
        }
    }

    /// Deletes a message, retrying while rate limited. Returns the last outcome.
    #[instrument(level = "debug", skip(self, target), fields(channel = %target.channel, msg = %target.msg))]
    pub async fn attempt(&self, target: &MsgInfo) -> DeleteOutcome {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = DeleteOutcome::from(self.platform.delete_message(target.channel, target.msg).await);
            match outcome {
                DeleteOutcome::Transient(retry_after) if attempts < self.config.max_attempts => {
                    let wait = retry_after.unwrap_or(self.config.default_retry_after);
                    warn!("rate limited, waiting {:?} (attempt {}/{})", wait, attempts, self.config.max_attempts);
                    tokio::time::sleep(wait).await;
                }
                DeleteOutcome::Transient(_) => {
                    warn!("still rate limited after {} attempts, abandoning", attempts);
                    return outcome;
                }
                DeleteOutcome::Fatal => {
                    warn!("delete failed, abandoning");
                    return outcome;
                }
                o => {
                    trace!("delete resolved: {:?}", o);
                    return o;
                }
            }
        }
    }
}
