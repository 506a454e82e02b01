//! Download phase worker
//!
//! Fetches discovered pages with redirects followed, runs them through the rewrite pipeline,
//! and writes the localized result over the raw HTML saved during discovery.

use crate::crawler::context::CrawlContext;
use crate::crawler::discover::Processed;
use crate::crawler::redirect::handle_redirect;
use crate::crawler::scheduler::PhaseReport;
use crate::rewrite::PageRewriter;
use crate::state::{Phase, UrlStatus};
use crate::storage::Outcome;
use crate::{MirrorError, Result};
use std::sync::Arc;

/// Pulls `discovered` records until none are left
pub struct DownloadWorker {
    id: usize,
    ctx: Arc<CrawlContext>,
    rewriter: Arc<dyn PageRewriter>,
}

impl DownloadWorker {
    pub fn new(id: usize, ctx: Arc<CrawlContext>, rewriter: Arc<dyn PageRewriter>) -> Self {
        Self { id, ctx, rewriter }
    }

    fn name(&self) -> String {
        format!("W{}", self.id)
    }

    /// Runs until no `discovered` record remains
    ///
    /// While the throttle's worker target is below this worker's id, the worker sits out one
    /// poll interval at a time instead of reserving work.
    pub async fn run(self) -> PhaseReport {
        let poll = self.ctx.config.scheduler.poll_interval();
        let mut report = PhaseReport::for_worker();

        loop {
            if self.id > self.ctx.fetcher.throttle().worker_target() {
                if !self.ctx.store.has_ready(Phase::Download) {
                    break;
                }
                tokio::time::sleep(poll).await;
                continue;
            }

            let path = match self.ctx.store.reserve_next(Phase::Download) {
                Ok(Some(path)) => path,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("[{}] Reservation failed: {}", self.name(), e);
                    tokio::time::sleep(poll).await;
                    continue;
                }
            };

            let processed = self.process(&path).await;
            report.record(processed);
        }

        tracing::debug!("[{}] No pages left, exiting", self.name());
        report
    }

    /// Handles one reserved path; never propagates an error
    pub(crate) async fn process(&self, path: &str) -> Processed {
        match self.try_process(path).await {
            Ok(processed) => processed,
            Err(e) => {
                tracing::warn!("[{}] {} failed: {}", self.name(), path, e);
                self.fail(path, format!("download error: {}", e))
            }
        }
    }

    async fn try_process(&self, path: &str) -> Result<Processed> {
        let ctx = &self.ctx;
        let url = ctx.site().url_for_path(path);
        let fetched = ctx.fetcher.fetch_text(&url, true).await;

        if fetched.final_url != url && handle_redirect(ctx, &self.name(), &url, &fetched.final_url)? {
            return Ok(Processed::Redirected);
        }

        let html = match fetched.body {
            Some(body) if fetched.status == 200 => body,
            _ => return Ok(self.fail(path, format!("HTTP {}", fetched.status))),
        };

        let local_path = ctx
            .store
            .local_path(path)
            .ok_or_else(|| MirrorError::MissingRecord(path.to_string()))?;

        let rendered = self
            .rewriter
            .process_page(&fetched.final_url, &html, &local_path)
            .await?;
        ctx.write_page(&local_path, rendered).await?;

        ctx.store
            .record_outcome(path, Phase::Download, Outcome::Success)?;
        tracing::info!("[{}] Saved {} -> {}", self.name(), path, local_path);
        Ok(Processed::Completed)
    }

    fn fail(&self, path: &str, message: String) -> Processed {
        match self
            .ctx
            .store
            .record_outcome(path, Phase::Download, Outcome::Failure(message.clone()))
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

impl std::fmt::Debug for DownloadWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadWorker").field("id", &self.id).finish_non_exhaustive()
    }
}
