/// URL lifecycle definitions for tracking crawl progress
///
/// A record moves `Queued -> Discovered -> Downloaded`, or ends in `Failed` once its retry
/// budget is spent. The two in-progress states mark a record that a worker has reserved and
/// is currently fetching; they never survive a restart.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current lifecycle status of a URL record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
    /// Newly seen, awaiting the discovery fetch
    Queued,

    /// Reserved by a discovery worker
    Discovering,

    /// Raw HTML fetched and links extracted, awaiting download
    Discovered,

    /// Reserved by a download worker
    Downloading,

    /// Final localized content written
    Downloaded,

    /// Retry budget exhausted, or the path redirects elsewhere
    Failed,
}

impl UrlStatus {
    /// Returns true if this record still has work ahead of it
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::Discovered)
    }

    /// Returns true if a worker currently holds this record
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Discovering | Self::Downloading)
    }

    /// Returns true if no phase will ever pick this record up again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Downloaded | Self::Failed)
    }

    /// The status a record held before it was reserved
    ///
    /// Used to release reservations left behind by an interrupted run.
    pub fn released(&self) -> Self {
        match self {
            Self::Discovering => Self::Queued,
            Self::Downloading => Self::Discovered,
            other => *other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Discovering => "discovering",
            Self::Discovered => "discovered",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible statuses in lifecycle order
    pub fn all_statuses() -> [Self; 6] {
        [
            Self::Queued,
            Self::Discovering,
            Self::Discovered,
            Self::Downloading,
            Self::Downloaded,
            Self::Failed,
        ]
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One of the two crawl phases driven by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Discovery,
    Download,
}

impl Phase {
    /// Status a record must hold to be reserved by this phase
    pub fn input_status(&self) -> UrlStatus {
        match self {
            Self::Discovery => UrlStatus::Queued,
            Self::Download => UrlStatus::Discovered,
        }
    }

    /// Status a record holds while a worker of this phase owns it
    pub fn in_progress_status(&self) -> UrlStatus {
        match self {
            Self::Discovery => UrlStatus::Discovering,
            Self::Download => UrlStatus::Downloading,
        }
    }

    /// Status a record advances to when this phase succeeds
    pub fn completion_status(&self) -> UrlStatus {
        match self {
            Self::Discovery => UrlStatus::Discovered,
            Self::Download => UrlStatus::Downloaded,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery => write!(f, "discovery"),
            Self::Download => write!(f, "download"),
        }
    }
}
