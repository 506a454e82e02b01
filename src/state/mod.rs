//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `UrlStatus`: Lifecycle of a single URL record (queued, discovered, downloaded, failed)
//! - `Phase`: The discovery and download phases and the statuses each one consumes and produces
//! - `ThrottleController`: Process-wide adaptive delay and worker target

mod throttle;
mod url_status;

// Re-export main types
pub use throttle::ThrottleController;
pub use url_status::{Phase, UrlStatus};
