//! Configuration module for Forum-Mirror
//!
//! This module handles loading, parsing, and validating the TOML settings file. Every
//! tunable of the crawler lives here; components receive the finished [`Config`] by
//! reference and never read ambient global state.
//!
//! # Example
//!
//! ```no_run
//! use forum_mirror::config::{apply_overrides, load_config};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("settings.toml")).unwrap();
//! let config = apply_overrides(config, "https://forum.example.com", Path::new("mirror")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AdSource, AssetConfig, Config, CrawlerConfig, FilterConfig, PathConfig, SchedulerConfig,
    SiteConfig, ThrottleConfig,
};

// Re-export parser functions
pub use parser::{apply_overrides, compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
