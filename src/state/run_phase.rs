/// Run phase definitions for the harvest state machine
///
/// A run moves strictly forward through these phases. `Failed` is only
/// reachable while discovering pagination; everything after that point
/// degrades per record instead of aborting.
use std::fmt;

/// Represents the current phase of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// Constructed, nothing fetched yet
    Idle,

    /// Fetching the root page and reading its pagination control
    Discovering,

    /// Walking listing pages and collecting detail links
    ListingPages,

    /// Worker pool is processing detail pages
    ExtractingRecords,

    /// No new work is handed out; waiting for in-flight records
    Draining,

    // ===== Terminal States =====
    /// Run finished (possibly with per-record failures or a cancellation)
    Done,

    /// Pagination discovery failed; nothing was persisted
    Failed,
}

impl RunPhase {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// Cancellation may jump from any working phase straight to `Draining`.
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Idle, Discovering)
                | (Discovering, ListingPages)
                | (Discovering, Failed)
                | (Discovering, Draining)
                | (ListingPages, ExtractingRecords)
                | (ListingPages, Draining)
                | (ExtractingRecords, Draining)
                | (Draining, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::ListingPages => "listing_pages",
            Self::ExtractingRecords => "extracting_records",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
