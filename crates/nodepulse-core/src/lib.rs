//! nodepulse-core: snapshot diffing and refresh coordination for nodepulse
//!
//! This crate holds everything the dashboard does besides talking to a
//! cluster and drawing to a terminal. It is kept independent of both so
//! that:
//!
//! - The diff engine and coordinator can be tested with scripted sources
//! - Any snapshot source (live cluster, mock generator) plugs in through one trait
//! - Rendering code only ever sees projected, ready-to-draw data
//!
//! # Modules
//!
//! - [`snapshot`] - Point-in-time cluster state (nodes, pods, containers)
//! - [`indicators`] - Pod health classification and ordering
//! - [`filter`] - Namespace/search projection into table rows
//! - [`diff`] - State cache producing change events
//! - [`change_log`] - Bounded change history and the change sink trait
//! - [`refresh`] - Single-flight refresh state machine
//! - [`errors`] - Fetch error taxonomy and user-facing messages
//! - [`formatting`] - Ages, timestamps and short labels
//! - [`constants`] - Fatal container reasons, retention and refresh defaults

pub mod change_log;
pub mod constants;
pub mod diff;
pub mod errors;
pub mod filter;
pub mod formatting;
pub mod indicators;
pub mod refresh;
pub mod snapshot;

// Re-export commonly used items at crate root
pub use change_log::{ChangeLog, ChangeSink};
pub use diff::{
    ChangeEvent, ChangeField, ChangeType, FieldValue, ResourceKind, ResourceState, StateCache,
    format_value,
};
pub use errors::*;
pub use filter::{FilterCriteria, FilteredView, NodeRow, project};
pub use formatting::*;
pub use indicators::*;
pub use refresh::{
    CoordinatorEvent, RefreshConfig, RefreshCoordinator, RefreshHandle, RefreshState,
    SnapshotSource, SnapshotUpdate,
};
pub use snapshot::*;
