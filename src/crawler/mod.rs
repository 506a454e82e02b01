//! Crawler module for mirroring a forum
//!
//! This module contains the crawl engine, including:
//! - Throttled HTTP fetching with bounded connections
//! - Link extraction and redirect handling
//! - Discovery and download workers and the scheduler driving them
//! - Asset downloading for the rewrite pipeline
//! - Overall run coordination

mod assets;
mod context;
mod coordinator;
mod discover;
mod download;
mod fetcher;
mod parser;
mod redirect;
mod scheduler;

pub use assets::{choose_extension, url_hash, AssetKind, AssetManager, FILE_DIR, IMAGE_DIR};
pub use context::CrawlContext;
pub use coordinator::{run_mirror, Coordinator, MirrorSummary};
pub use discover::DiscoveryWorker;
pub use download::DownloadWorker;
pub use fetcher::{
    build_http_client, cookie_header, FetchedBytes, FetchedText, Fetcher, TRANSPORT_FAILURE_STATUS,
};
pub use parser::{extract_hrefs, extract_links};
pub use redirect::handle_redirect;
pub use scheduler::{PhaseReport, Scheduler};
