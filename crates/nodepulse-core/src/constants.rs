//! Shared constants for the dashboard
//!
//! Container reasons that classify a pod as failing, retention limits and
//! the default refresh intervals.

/// Waiting reasons that mark a container (and its pod) as failing
pub const FATAL_WAITING_REASONS: &[&str] = &[
    "CrashLoopBackOff",
    "Error",
    "ImagePullBackOff",
    "ErrImagePull",
];

/// Number of change events kept in memory for display
pub const DEFAULT_CHANGE_LOG_SIZE: usize = 20;

/// Readiness condition type reported on nodes
pub const NODE_READY_CONDITION: &str = "Ready";

// =============================================================================
// Default Refresh Intervals
// =============================================================================

/// Default refresh intervals (in seconds)
pub mod refresh_intervals {
    /// Retry cadence while fetches are failing
    pub const RETRY: u64 = 5;

    /// Regular poll cadence
    pub const POLL: u64 = 10;

    /// Upper bound for a single fetch
    pub const FETCH_TIMEOUT: u64 = 30;
}
