//! Discovery phase worker
//!
//! Fetches queued pages without following redirects, stores the raw HTML, and enqueues every
//! crawlable link it finds.

use crate::crawler::context::CrawlContext;
use crate::crawler::parser::extract_links;
use crate::crawler::redirect::handle_redirect;
use crate::crawler::scheduler::PhaseReport;
use crate::state::{Phase, UrlStatus};
use crate::storage::Outcome;
use crate::{MirrorError, Result};
use std::sync::Arc;

/// What happened to one reserved path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Processed {
    Completed,
    Redirected,
    Failed,
}

/// Pulls `queued` records until the store stays empty for too long
#[derive(Debug)]
pub struct DiscoveryWorker {
    id: usize,
    ctx: Arc<CrawlContext>,
}

impl DiscoveryWorker {
    pub fn new(id: usize, ctx: Arc<CrawlContext>) -> Self {
        Self { id, ctx }
    }

    fn name(&self) -> String {
        format!("D{}", self.id)
    }

    /// Runs until more than `scheduler.max-idle-polls` consecutive reservations come back empty
    pub async fn run(self) -> PhaseReport {
        let scheduler = &self.ctx.config.scheduler;
        let mut report = PhaseReport::for_worker();
        let mut idle = 0u32;

        tracing::debug!("[{}] Discovery worker started", self.name());

        loop {
            let path = match self.ctx.store.reserve_next(Phase::Discovery) {
                Ok(path) => path,
                Err(e) => {
                    tracing::error!("[{}] Reservation failed: {}", self.name(), e);
                    None
                }
            };

            let Some(path) = path else {
                idle += 1;
                if idle > scheduler.max_idle_polls {
                    break;
                }
                tokio::time::sleep(scheduler.poll_interval()).await;
                continue;
            };

            idle = 0;
            let processed = self.process(&path).await;
            report.record(processed);
        }

        tracing::debug!("[{}] Discovery worker idle, exiting", self.name());
        report
    }

    /// Handles one reserved path; never propagates an error
    pub(crate) async fn process(&self, path: &str) -> Processed {
        match self.try_process(path).await {
            Ok(processed) => processed,
            Err(e) => {
                tracing::warn!("[{}] {} failed: {}", self.name(), path, e);
                self.fail(path, format!("discover error: {}", e))
            }
        }
    }

    async fn try_process(&self, path: &str) -> Result<Processed> {
        let ctx = &self.ctx;
        let url = ctx.site().url_for_path(path);
        let fetched = ctx.fetcher.fetch_text(&url, false).await;

        if (300..400).contains(&fetched.status)
            && handle_redirect(ctx, &self.name(), &url, &fetched.final_url)?
        {
            return Ok(Processed::Redirected);
        }

        let body = match fetched.body {
            Some(body) if fetched.status == 200 => body,
            _ => return Ok(self.fail(path, format!("HTTP {}", fetched.status))),
        };

        let local_path = ctx
            .store
            .local_path(path)
            .ok_or_else(|| MirrorError::MissingRecord(path.to_string()))?;

        let links = extract_links(&body, &fetched.final_url, &ctx.filter);
        ctx.write_page(&local_path, body).await?;
        let added = ctx.enqueue(&links)?;

        ctx.store
            .record_outcome(path, Phase::Discovery, Outcome::Success)?;
        tracing::info!(
            "[{}] {} -> {} links, {} new",
            self.name(),
            path,
            links.len(),
            added
        );
        Ok(Processed::Completed)
    }

    fn fail(&self, path: &str, message: String) -> Processed {
        match self
            .ctx
            .store
            .record_outcome(path, Phase::Discovery, Outcome::Failure(message.clone()))
        {
            Ok(Some(UrlStatus::Failed)) => {
                tracing::warn!("[{}] {} gave up: {}", self.name(), path, message)
            }
            Ok(_) => tracing::debug!("[{}] {} will retry: {}", self.name(), path, message),
            Err(e) => tracing::error!("[{}] Could not record failure of {}: {}", self.name(), path, e),
        }
        Processed::Failed
    }
}
