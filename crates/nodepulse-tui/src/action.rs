//! Actions for the nodepulse TUI
//!
//! Actions represent events that can modify application state.

/// Actions that can be dispatched in the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // Navigation
    Quit,
    FocusNext,

    // Refresh
    Refresh,
    ClearChangeLog,

    // Overlays
    /// Open the detail overlay for a node
    ShowNodeDetails(String),
    CloseNodeDetails,
    /// Open the pod list for a node and namespace
    ShowPodDetails { node: String, namespace: String },
    ClosePodDetails,
    ToggleHelp,

    // Search
    /// Query edited; preview it without touching the coordinator
    SearchChanged(String),
    /// Query confirmed with Enter
    SearchCommitted(String),
    SearchCleared,

    // UI state
    Tick,
    Resize(u16, u16),
}
