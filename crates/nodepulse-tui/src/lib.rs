//! nodepulse-tui: terminal dashboard for nodepulse
//!
//! Renders the node table, the change log and the overlays on top of a
//! running [`nodepulse_core::RefreshCoordinator`].

pub mod action;
pub mod app;
pub mod components;
pub mod journal;
pub mod tui;
pub mod ui_ext;

pub use app::App;
pub use journal::{ChangeJournal, ChangeRecorder};
