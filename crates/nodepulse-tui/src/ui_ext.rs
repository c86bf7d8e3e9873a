//! Colors for core types
//!
//! Keeps ratatui out of nodepulse-core.

use nodepulse_core::{ChangeType, HealthIndicator, PodPhase};
use ratatui::style::Color;

/// Extension trait for HealthIndicator to provide ratatui colors
pub trait HealthIndicatorExt {
    fn color(&self) -> Color;

    /// Get symbol and color together (common pattern)
    fn symbol_and_color(&self) -> (&'static str, Color);
}

impl HealthIndicatorExt for HealthIndicator {
    fn color(&self) -> Color {
        match self {
            HealthIndicator::Ok => Color::Green,
            HealthIndicator::Warning => Color::Yellow,
            HealthIndicator::Error => Color::Red,
        }
    }

    fn symbol_and_color(&self) -> (&'static str, Color) {
        (self.symbol(), self.color())
    }
}

/// Extension trait for ChangeType to color the change log
pub trait ChangeTypeExt {
    fn color(&self) -> Color;
}

impl ChangeTypeExt for ChangeType {
    fn color(&self) -> Color {
        match self {
            ChangeType::Added => Color::Green,
            ChangeType::Removed => Color::Red,
            ChangeType::Modified => Color::Yellow,
        }
    }
}

/// Extension trait for PodPhase
pub trait PodPhaseExt {
    fn color(&self) -> Color;
}

impl PodPhaseExt for PodPhase {
    fn color(&self) -> Color {
        match self {
            PodPhase::Running | PodPhase::Succeeded => Color::Green,
            PodPhase::Pending | PodPhase::Terminating => Color::Yellow,
            PodPhase::Failed => Color::Red,
            PodPhase::Unknown => Color::DarkGray,
        }
    }
}

/// Readiness color for a node status cell
pub fn ready_color(ready: bool) -> Color {
    if ready { Color::Green } else { Color::Red }
}
