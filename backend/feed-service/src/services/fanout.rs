//! Fan-out on write
//!
//! `FanoutDispatcher` owns a bounded job queue and a fixed set of worker
//! tasks. Each job resolves the author's follower snapshot and appends one
//! `FeedEntry` per follower with bounded concurrency. Per-follower failures
//! are logged and counted, never propagated.

use crate::config::FeedConfig;
use crate::db::TimelineStore;
use crate::metrics;
use crate::models::FanoutJob;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use graph_service::UserGraphService;
use social_common::{Result, SocialError, UserId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Skipped,
    Failed,
}

/// Per-job outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Executes a single fan-out job
pub struct FanoutWorker {
    graph: UserGraphService,
    timelines: Arc<dyn TimelineStore>,
    write_concurrency: usize,
    include_author: bool,
}

impl FanoutWorker {
    pub fn new(
        graph: UserGraphService,
        timelines: Arc<dyn TimelineStore>,
        config: &FeedConfig,
    ) -> Self {
        Self {
            graph,
            timelines,
            write_concurrency: config.write_concurrency.max(1),
            include_author: config.include_author,
        }
    }

    pub async fn run(&self, job: &FanoutJob) -> Result<FanoutReport> {
        // Anyone created after this instant is not the follower the snapshot saw
        let snapshot_at = Utc::now();
        let mut recipients = self.graph.get_all_follower_ids(&job.author).await?;
        if self.include_author && !recipients.contains(&job.author) {
            recipients.push(job.author.clone());
        }

        let outcomes: Vec<Delivery> = stream::iter(recipients)
            .map(|owner| self.deliver(job, owner, snapshot_at))
            .buffer_unordered(self.write_concurrency)
            .collect()
            .await;

        let mut report = FanoutReport::default();
        for outcome in outcomes {
            match outcome {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Skipped => report.skipped += 1,
                Delivery::Failed => report.failed += 1,
            }
        }
        Ok(report)
    }

    /// Whether `owner` is still the user present at `snapshot_at`
    async fn still_recipient(&self, owner: &UserId, snapshot_at: DateTime<Utc>) -> Result<bool> {
        match self.graph.get_user(owner).await {
            Ok(user) => Ok(user.created_at <= snapshot_at),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Append to one owner's timeline unless they were removed mid-flight.
    ///
    /// The owner is checked again after the append: a removal (and possibly a
    /// re-creation under the same id) that raced the write takes the entry
    /// back out, so a purged timeline stays purged.
    async fn deliver(&self, job: &FanoutJob, owner: UserId, snapshot_at: DateTime<Utc>) -> Delivery {
        match self.still_recipient(&owner, snapshot_at).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(owner = %owner, content_id = %job.content_id, "Follower gone, skipping");
                return Delivery::Skipped;
            }
            Err(e) => {
                warn!(owner = %owner, error = %e, "Follower lookup failed during fan-out");
                return Delivery::Failed;
            }
        }

        if let Err(e) = self.timelines.append(job.entry_for(&owner)).await {
            warn!(
                owner = %owner,
                content_id = %job.content_id,
                error = %e,
                "Timeline append failed, continuing fan-out"
            );
            return Delivery::Failed;
        }

        match self.still_recipient(&owner, snapshot_at).await {
            Ok(true) => Delivery::Delivered,
            Ok(false) => match self.timelines.remove(&owner, job.content_id).await {
                Ok(()) => {
                    debug!(owner = %owner, content_id = %job.content_id, "Follower removed during append, entry withdrawn");
                    Delivery::Skipped
                }
                Err(e) => {
                    warn!(owner = %owner, content_id = %job.content_id, error = %e, "Failed to withdraw stale entry");
                    Delivery::Failed
                }
            },
            Err(e) => {
                warn!(owner = %owner, error = %e, "Follower re-check failed after append");
                Delivery::Delivered
            }
        }
    }

    async fn process(&self, job: FanoutJob) {
        let started = Instant::now();
        match self.run(&job).await {
            Ok(report) => {
                metrics::record_fanout_job("completed");
                metrics::record_deliveries("delivered", report.delivered);
                metrics::record_deliveries("skipped", report.skipped);
                metrics::record_deliveries("failed", report.failed);
                info!(
                    author = %job.author,
                    content_id = %job.content_id,
                    delivered = report.delivered,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Fan-out completed"
                );
            }
            Err(e) if e.is_not_found() => {
                metrics::record_fanout_job("author_missing");
                debug!(author = %job.author, "Author removed before fan-out, dropping job");
            }
            Err(e) => {
                metrics::record_fanout_job("failed");
                error!(author = %job.author, content_id = %job.content_id, error = %e, "Fan-out failed");
            }
        }
        metrics::record_fanout_duration(started.elapsed());
    }
}

/// Bounded queue plus worker pool for fan-out jobs.
///
/// Must be started inside a Tokio runtime.
pub struct FanoutDispatcher {
    sender: Mutex<Option<mpsc::Sender<FanoutJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl FanoutDispatcher {
    pub fn start(worker: Arc<FanoutWorker>, workers: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        let handles = (0..workers.max(1))
            .map(|id| {
                let worker = Arc::clone(&worker);
                let receiver = Arc::clone(&receiver);
                let in_flight = Arc::clone(&in_flight);
                let idle = Arc::clone(&idle);
                tokio::spawn(async move {
                    debug!(worker = id, "Fan-out worker started");
                    loop {
                        let job = receiver.lock().await.recv().await;
                        let Some(job) = job else { break };
                        metrics::job_dequeued();

                        worker.process(job).await;
                        if in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
                            idle.notify_waiters();
                        }
                    }
                    debug!(worker = id, "Fan-out worker stopped");
                })
            })
            .collect();

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            in_flight,
            idle,
        }
    }

    /// Queue a job; waits for room when the queue is full
    pub async fn enqueue(&self, job: FanoutJob) -> Result<()> {
        self.reserve().await?.send(job);
        Ok(())
    }

    /// Claim one queue slot ahead of the job it will carry.
    ///
    /// Dropping the permit unused gives the slot back.
    pub async fn reserve(&self) -> Result<FanoutPermit> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or(SocialError::FanoutUnavailable)?;

        let permit = sender
            .reserve_owned()
            .await
            .map_err(|_| SocialError::FanoutUnavailable)?;
        Ok(FanoutPermit {
            permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Jobs queued or running
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Resolve once no job is queued or running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting jobs, drain the queue and join the workers
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();

        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Fan-out worker panicked");
            }
        }
        info!("Fan-out dispatcher stopped");
    }

}

/// A reserved queue slot; sending cannot fail
pub struct FanoutPermit {
    permit: mpsc::OwnedPermit<FanoutJob>,
    in_flight: Arc<AtomicUsize>,
}

impl FanoutPermit {
    pub fn send(self, job: FanoutJob) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        metrics::job_enqueued();
        self.permit.send(job);
    }
}
