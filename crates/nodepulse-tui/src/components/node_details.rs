//! Node detail overlay
//!
//! Shown over the nodes table while scheduled refreshes are paused. A
//! manual refresh still updates the content.

use crate::action::Action;
use crate::components::{Component, centered_rect};
use crate::ui_ext::{HealthIndicatorExt, PodPhaseExt, ready_color};
use chrono::{SecondsFormat, Utc};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use nodepulse_core::{
    ClusterSnapshot, NodeSnapshot, PodIndicator, format_age, pluralize, sort_indicators,
};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
};
use std::sync::Arc;

pub struct NodeDetailsComponent {
    node: Arc<NodeSnapshot>,
    pods: Vec<PodIndicator>,
    /// Set when the node disappeared from a later snapshot
    removed: bool,
    table_state: TableState,
}

impl NodeDetailsComponent {
    pub fn new(node: Arc<NodeSnapshot>) -> Self {
        let mut details = Self {
            pods: Vec::new(),
            node,
            removed: false,
            table_state: TableState::default(),
        };
        details.rebuild_pods();
        details
    }

    pub fn node_name(&self) -> &str {
        &self.node.name
    }

    /// Pick up the latest state of this node
    pub fn refresh(&mut self, snapshot: &ClusterSnapshot) {
        match snapshot.get(&self.node.name) {
            Some(node) => {
                self.node = Arc::clone(node);
                self.removed = false;
                self.rebuild_pods();
            }
            None => self.removed = true,
        }
    }

    fn rebuild_pods(&mut self) {
        let mut pods: Vec<PodIndicator> = self
            .node
            .pods
            .values()
            .map(PodIndicator::from_pod)
            .collect();
        sort_indicators(&mut pods);
        self.pods = pods;

        let selected = self.table_state.selected().unwrap_or(0);
        if self.pods.is_empty() {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(selected.min(self.pods.len() - 1)));
        }
    }

    fn scroll(&mut self, delta: isize) {
        if self.pods.is_empty() {
            return;
        }
        let last = self.pods.len() - 1;
        let current = self.table_state.selected().unwrap_or(0);
        let next = current.saturating_add_signed(delta).min(last);
        self.table_state.select(Some(next));
    }

    fn info_lines(&self) -> Vec<Line<'static>> {
        let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Cyan));
        let node = &self.node;
        let created = node.creation_time;
        let mut lines = vec![
            Line::from(vec![
                label("Status:   "),
                Span::styled(
                    node.status_label(),
                    Style::default().fg(ready_color(node.ready)),
                ),
            ]),
            Line::from(vec![label("Kubelet:  "), Span::raw(node.kubelet_version.clone())]),
            Line::from(vec![
                label("Created:  "),
                Span::raw(created.to_rfc3339_opts(SecondsFormat::Secs, true)),
                Span::styled(
                    format!(" ({} ago)", format_age(created, Utc::now())),
                    Style::default().fg(Color::DarkGray),
                ),
            ]),
            Line::from(vec![
                label("Pods:     "),
                Span::raw(pluralize(node.pod_count(), "pod", "pods")),
            ]),
        ];
        if self.removed {
            lines.push(Line::from(Span::styled(
                "Node is no longer part of the cluster",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
        }
        lines
    }
}

impl Component for NodeDetailsComponent {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return Ok(Some(Action::CloseNodeDetails)),
            KeyCode::Char('j') | KeyCode::Down => self.scroll(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll(-1),
            KeyCode::PageDown => self.scroll(10),
            KeyCode::PageUp => self.scroll(-10),
            KeyCode::Char('r') => return Ok(Some(Action::Refresh)),
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, _action: Action) -> Result<Option<Action>> {
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let area = centered_rect(
            area.width.saturating_sub(8),
            area.height.saturating_sub(4),
            area,
        );
        frame.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Node: {} ", self.node.name))
            .title_bottom(" [Esc] close  [↑↓] scroll  [r] refresh ")
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let info = self.info_lines();
        let chunks = Layout::vertical([
            Constraint::Length(info.len() as u16 + 1),
            Constraint::Min(3),
        ])
        .split(inner);
        frame.render_widget(Paragraph::new(info), chunks[0]);

        let rows = self.pods.iter().map(|pod| {
            let (symbol, color) = pod.health.symbol_and_color();
            Row::new(vec![
                Cell::from(symbol).style(Style::default().fg(color)),
                Cell::from(pod.pod.clone()),
                Cell::from(pod.namespace.clone()),
                Cell::from(pod.phase.as_str()).style(Style::default().fg(pod.phase.color())),
                Cell::from(pod.restart_count.to_string()),
            ])
        });
        let widths = [
            Constraint::Length(2),
            Constraint::Min(24),
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(8),
        ];
        let table = Table::new(rows, widths)
            .header(
                Row::new(["", "POD", "NAMESPACE", "PHASE", "RESTARTS"])
                    .style(Style::default().add_modifier(Modifier::DIM))
                    .bottom_margin(1),
            )
            .row_highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_stateful_widget(table, chunks[1], &mut self.table_state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use nodepulse_core::{HealthIndicator, PodPhase, PodSnapshot};
    use std::collections::BTreeMap;

    fn node(ready: bool) -> NodeSnapshot {
        NodeSnapshot::new("node1", ready, "v1.30.0", Utc::now())
            .with_pod(PodSnapshot::new("ok", "default", PodPhase::Running, BTreeMap::new()))
            .with_pod(PodSnapshot::new("bad", "default", PodPhase::Failed, BTreeMap::new()))
    }

    #[test]
    fn test_pods_sorted_worst_first() {
        let details = NodeDetailsComponent::new(Arc::new(node(true)));
        assert_eq!(details.pods[0].pod, "bad");
        assert_eq!(details.pods[0].health, HealthIndicator::Error);
        assert_eq!(details.table_state.selected(), Some(0));
    }

    #[test]
    fn test_refresh_tracks_node() {
        let mut details = NodeDetailsComponent::new(Arc::new(node(true)));

        let snapshot: ClusterSnapshot = [node(false)].into_iter().collect();
        details.refresh(&snapshot);
        assert!(!details.node.ready);
        assert!(!details.removed);

        details.refresh(&ClusterSnapshot::new());
        assert!(details.removed);
        assert_eq!(details.node_name(), "node1");
    }

    #[test]
    fn test_escape_closes() {
        let mut details = NodeDetailsComponent::new(Arc::new(node(true)));
        let action = details
            .handle_key_event(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE))
            .unwrap();
        assert_eq!(action, Some(Action::CloseNodeDetails));
    }
}
