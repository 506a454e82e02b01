//! Phase scheduler
//!
//! This module handles:
//! - Running the discovery phase with a pool that grows while backlog accumulates
//! - Running the download phase with a fixed pool
//! - Collecting per-worker reports into a phase total

use crate::crawler::context::CrawlContext;
use crate::crawler::discover::{DiscoveryWorker, Processed};
use crate::crawler::download::DownloadWorker;
use crate::rewrite::PageRewriter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;

/// Counters of one phase, summed over its workers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseReport {
    /// Workers that took part
    pub workers: usize,

    /// Paths that reached the phase's completion status
    pub completed: usize,

    /// Paths found to redirect elsewhere
    pub redirected: usize,

    /// Failed attempts, including those that will be retried
    pub failed: usize,
}

impl PhaseReport {
    /// Empty report of a single worker
    pub(crate) fn for_worker() -> Self {
        Self {
            workers: 1,
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, processed: Processed) {
        match processed {
            Processed::Completed => self.completed += 1,
            Processed::Redirected => self.redirected += 1,
            Processed::Failed => self.failed += 1,
        }
    }

    /// Adds another worker's counters to this one
    pub fn merge(&mut self, other: PhaseReport) {
        self.workers += other.workers;
        self.completed += other.completed;
        self.redirected += other.redirected;
        self.failed += other.failed;
    }

    /// Total reservations handled
    pub fn attempts(&self) -> usize {
        self.completed + self.redirected + self.failed
    }
}

impl std::fmt::Display for PhaseReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} workers, {} completed, {} redirected, {} failed attempts",
            self.workers, self.completed, self.redirected, self.failed
        )
    }
}

/// Drives the two crawl phases over a shared context
pub struct Scheduler {
    ctx: Arc<CrawlContext>,
    rewriter: Arc<dyn PageRewriter>,
}

impl Scheduler {
    pub fn new(ctx: Arc<CrawlContext>, rewriter: Arc<dyn PageRewriter>) -> Self {
        Self { ctx, rewriter }
    }

    /// Runs discovery until the bootstrap worker goes idle, then joins every helper
    ///
    /// A helper is spawned on each grow tick while the backlog is at least
    /// `scheduler.grow-backlog` and fewer workers run than both `crawler.workers` and the
    /// throttle's current target allow.
    pub async fn run_discovery_phase(&self) -> PhaseReport {
        let scheduler = &self.ctx.config.scheduler;
        let max_workers = self.ctx.config.crawler.workers;

        tracing::info!("Discovery phase started");

        let mut report = PhaseReport::default();
        let mut helpers = JoinSet::new();
        let active_helpers = Arc::new(AtomicUsize::new(0));
        let mut next_id = 2;

        let mut bootstrap = tokio::spawn(DiscoveryWorker::new(1, Arc::clone(&self.ctx)).run());

        let mut grow = tokio::time::interval(scheduler.grow_interval());
        grow.set_missed_tick_behavior(MissedTickBehavior::Delay);
        grow.tick().await;

        let bootstrap_result = loop {
            tokio::select! {
                joined = &mut bootstrap => break joined,
                _ = grow.tick() => {
                    let running = 1 + active_helpers.load(Ordering::SeqCst);
                    let allowed = max_workers.min(self.ctx.fetcher.throttle().worker_target());
                    let backlog = self.ctx.store.pending_count();

                    if backlog >= scheduler.grow_backlog && running < allowed {
                        let worker = DiscoveryWorker::new(next_id, Arc::clone(&self.ctx));
                        let active = Arc::clone(&active_helpers);
                        active.fetch_add(1, Ordering::SeqCst);
                        helpers.spawn(async move {
                            let report = worker.run().await;
                            active.fetch_sub(1, Ordering::SeqCst);
                            report
                        });
                        tracing::info!(
                            "Spawned discovery worker D{} (backlog {}, {} running)",
                            next_id,
                            backlog,
                            running + 1
                        );
                        next_id += 1;
                    }
                }
            }
        };

        merge_joined(&mut report, bootstrap_result);
        while let Some(joined) = helpers.join_next().await {
            merge_joined(&mut report, joined);
        }

        tracing::info!("Discovery phase finished: {}", report);
        report
    }

    /// Runs `crawler.workers` download workers until no discovered page remains
    pub async fn run_download_phase(&self) -> PhaseReport {
        let workers = self.ctx.config.crawler.workers;
        tracing::info!("Download phase started with {} workers", workers);

        let mut set = JoinSet::new();
        for id in 1..=workers {
            let worker =
                DownloadWorker::new(id, Arc::clone(&self.ctx), Arc::clone(&self.rewriter));
            set.spawn(worker.run());
        }

        let mut report = PhaseReport::default();
        while let Some(joined) = set.join_next().await {
            merge_joined(&mut report, joined);
        }

        tracing::info!("Download phase finished: {}", report);
        report
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("ctx", &self.ctx).finish_non_exhaustive()
    }
}

fn merge_joined(report: &mut PhaseReport, joined: Result<PhaseReport, JoinError>) {
    match joined {
        Ok(worker_report) => report.merge(worker_report),
        Err(e) => tracing::error!("Worker task failed: {}", e),
    }
}
