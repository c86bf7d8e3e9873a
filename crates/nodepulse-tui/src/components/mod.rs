//! Component system for the nodepulse TUI
//!
//! Based on the ratatui Component template pattern.

pub mod change_log;
pub mod node_details;
pub mod nodes;
pub mod overlays;
pub mod pod_details;

pub use change_log::ChangeLogComponent;
pub use node_details::NodeDetailsComponent;
pub use nodes::NodesComponent;
pub use pod_details::PodDetailsComponent;

use crate::action::Action;
use color_eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
};

/// Trait for UI components
///
/// Components handle key events, update their state from actions and
/// render themselves.
pub trait Component {
    /// Handle key events and optionally produce actions
    fn handle_key_event(&mut self, _key: KeyEvent) -> Result<Option<Action>> {
        Ok(None)
    }

    /// Update the component state based on an action
    fn update(&mut self, action: Action) -> Result<Option<Action>>;

    /// Render the component to the frame
    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()>;
}

/// Centered rectangle of at most `width` x `height` inside `area`
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .areas(area);
    let [rect] = Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .areas(row);
    rect
}
