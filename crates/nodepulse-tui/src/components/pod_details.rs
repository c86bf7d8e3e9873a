//! Pod detail overlay
//!
//! Lists the pods of one node in one namespace, as they passed the current
//! filter. Scheduled refreshes are paused while it is open.

use crate::action::Action;
use crate::components::{Component, centered_rect};
use crate::ui_ext::{HealthIndicatorExt, PodPhaseExt};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use nodepulse_core::{
    FilteredView, HealthIndicator, PodIndicator, PodSnapshot, overall_health, pluralize,
};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
};
use std::cmp::Reverse;

/// Restart counts above this are shown in red
const RESTARTS_ALARM: u32 = 5;

/// One pod row with its container breakdown
#[derive(Debug, Clone, PartialEq, Eq)]
struct PodRow {
    indicator: PodIndicator,
    ready: usize,
    total: usize,
    /// `name: state` for every container
    containers: String,
}

impl PodRow {
    fn from_pod(pod: &PodSnapshot) -> Self {
        let containers = pod
            .containers
            .iter()
            .map(|(name, container)| format!("{}: {}", name, container.state))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            indicator: PodIndicator::from_pod(pod),
            ready: pod
                .containers
                .values()
                .filter(|c| c.state.is_running())
                .count(),
            total: pod.containers.len(),
            containers,
        }
    }
}

fn restart_color(restarts: u32) -> Color {
    match restarts {
        0 => Color::Green,
        n if n > RESTARTS_ALARM => Color::Red,
        _ => Color::Yellow,
    }
}

pub struct PodDetailsComponent {
    node: String,
    namespace: String,
    pods: Vec<PodRow>,
    health: HealthIndicator,
    /// Set when the node disappeared from a later view
    removed: bool,
    table_state: TableState,
}

impl PodDetailsComponent {
    pub fn new(node: impl Into<String>, namespace: impl Into<String>, view: &FilteredView) -> Self {
        let mut details = Self {
            node: node.into(),
            namespace: namespace.into(),
            pods: Vec::new(),
            health: HealthIndicator::Ok,
            removed: false,
            table_state: TableState::default(),
        };
        details.refresh(view);
        details
    }

    pub fn node_name(&self) -> &str {
        &self.node
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Rebuild the rows from the latest filtered view
    pub fn refresh(&mut self, view: &FilteredView) {
        let Some(node) = view.snapshot.get(&self.node) else {
            self.removed = true;
            return;
        };
        self.removed = false;

        let mut rows: Vec<PodRow> = node
            .pods
            .values()
            .filter(|pod| pod.namespace == self.namespace)
            .map(PodRow::from_pod)
            .collect();
        // Same order as the namespace cell: errors first, stable otherwise
        rows.sort_by_key(|row| Reverse(row.indicator.health.severity()));
        self.health = overall_health(rows.iter().map(|row| &row.indicator));
        self.pods = rows;

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
        self.table_state
            .select(Some(current.saturating_add_signed(delta).min(last)));
    }

    fn summary_line(&self) -> Line<'static> {
        if self.removed {
            return Line::from(Span::styled(
                "Node is no longer part of the cluster",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        }
        let (symbol, color) = self.health.symbol_and_color();
        Line::from(vec![
            Span::styled(
                format!("{} {}", symbol, self.health),
                Style::default().fg(color),
            ),
            Span::styled(
                format!("  {}", pluralize(self.pods.len(), "pod", "pods")),
                Style::default().fg(Color::DarkGray),
            ),
        ])
    }
}

impl Component for PodDetailsComponent {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return Ok(Some(Action::ClosePodDetails)),
            KeyCode::Char('j') | KeyCode::Down => self.scroll(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll(-1),
            KeyCode::PageDown => self.scroll(10),
            KeyCode::PageUp => self.scroll(-10),
            KeyCode::Home => self.scroll(isize::MIN),
            KeyCode::End => self.scroll(isize::MAX),
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
            .title(format!(" Pods: {} / {} ", self.node, self.namespace))
            .title_bottom(" [Esc] close  [↑↓] scroll  [r] refresh ")
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let chunks = Layout::vertical([Constraint::Length(2), Constraint::Min(3)]).split(inner);
        frame.render_widget(Paragraph::new(self.summary_line()), chunks[0]);

        let rows = self.pods.iter().map(|row| {
            let pod = &row.indicator;
            let (symbol, color) = pod.health.symbol_and_color();
            let ready_color = if row.ready == row.total {
                Color::Green
            } else {
                Color::Yellow
            };
            Row::new(vec![
                Cell::from(symbol).style(Style::default().fg(color)),
                Cell::from(pod.pod.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(pod.phase.as_str()).style(Style::default().fg(pod.phase.color())),
                Cell::from(format!("{}/{}", row.ready, row.total))
                    .style(Style::default().fg(ready_color)),
                Cell::from(pod.restart_count.to_string())
                    .style(Style::default().fg(restart_color(pod.restart_count))),
                Cell::from(row.containers.clone()),
            ])
        });
        let widths = [
            Constraint::Length(2),
            Constraint::Min(24),
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Length(9),
            Constraint::Min(20),
        ];
        let table = Table::new(rows, widths)
            .header(
                Row::new(["", "POD", "STATUS", "READY", "RESTARTS", "CONTAINERS"])
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
    use chrono::Utc;
    use crossterm::event::KeyModifiers;
    use nodepulse_core::{
        ClusterSnapshot, ContainerSnapshot, ContainerState, FilterCriteria, NodeSnapshot,
        PodPhase, project,
    };
    use ratatui::{Terminal, backend::TestBackend};
    use std::collections::BTreeMap;

    fn pod(name: &str, namespace: &str, phase: PodPhase) -> PodSnapshot {
        PodSnapshot::new(name, namespace, phase, BTreeMap::new())
    }

    fn snapshot() -> ClusterSnapshot {
        let crashing = ContainerState::Waiting(Some("CrashLoopBackOff".to_string()));
        let node = NodeSnapshot::new("node1", true, "v1.30.0", Utc::now())
            .with_pod(
                pod("web", "default", PodPhase::Running)
                    .with_container("app", ContainerSnapshot::new(ContainerState::Running, 0))
                    .with_container("proxy", ContainerSnapshot::new(crashing, 7)),
            )
            .with_pod(
                pod("api", "default", PodPhase::Running)
                    .with_container("app", ContainerSnapshot::new(ContainerState::Running, 0)),
            )
            .with_pod(pod("dns", "kube-system", PodPhase::Running));
        [node].into_iter().collect()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_lists_only_the_namespace() {
        let view = project(&snapshot(), &FilterCriteria::default());
        let details = PodDetailsComponent::new("node1", "default", &view);

        let names: Vec<&str> = details
            .pods
            .iter()
            .map(|r| r.indicator.pod.as_str())
            .collect();
        assert_eq!(names, vec!["web", "api"]);
        assert_eq!(details.health, HealthIndicator::Error);
        assert_eq!(details.table_state.selected(), Some(0));
    }

    #[test]
    fn test_container_breakdown() {
        let view = project(&snapshot(), &FilterCriteria::default());
        let details = PodDetailsComponent::new("node1", "default", &view);

        let web = &details.pods[0];
        assert_eq!((web.ready, web.total), (1, 2));
        assert_eq!(web.indicator.restart_count, 7);
        assert_eq!(web.containers, "app: Running, proxy: CrashLoopBackOff");
        assert_eq!(restart_color(7), Color::Red);
        assert_eq!(restart_color(2), Color::Yellow);
        assert_eq!(restart_color(0), Color::Green);
    }

    #[test]
    fn test_follows_search_filter() {
        let view = project(&snapshot(), &FilterCriteria::default().with_search("api"));
        let details = PodDetailsComponent::new("node1", "default", &view);
        assert_eq!(details.pods.len(), 1);
        assert_eq!(details.health, HealthIndicator::Ok);
    }

    #[test]
    fn test_refresh_marks_removed_node() {
        let view = project(&snapshot(), &FilterCriteria::default());
        let mut details = PodDetailsComponent::new("node1", "kube-system", &view);
        assert_eq!(details.pods.len(), 1);

        details.refresh(&FilteredView::default());
        assert!(details.removed);
        assert_eq!(details.pods.len(), 1);
        assert_eq!(details.namespace(), "kube-system");
    }

    #[test]
    fn test_keys() {
        let view = project(&snapshot(), &FilterCriteria::default());
        let mut details = PodDetailsComponent::new("node1", "default", &view);

        details.handle_key_event(key(KeyCode::End)).unwrap();
        assert_eq!(details.table_state.selected(), Some(1));
        details.handle_key_event(key(KeyCode::Home)).unwrap();
        assert_eq!(details.table_state.selected(), Some(0));

        let action = details.handle_key_event(key(KeyCode::Esc)).unwrap();
        assert_eq!(action, Some(Action::ClosePodDetails));
    }

    #[test]
    fn test_draw_shows_containers() {
        let view = project(&snapshot(), &FilterCriteria::default());
        let mut details = PodDetailsComponent::new("node1", "default", &view);
        let mut terminal = Terminal::new(TestBackend::new(120, 16)).unwrap();
        terminal
            .draw(|frame| details.draw(frame, frame.area()).unwrap())
            .unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("Pods: node1 / default"));
        assert!(text.contains("1/2"));
        assert!(text.contains("app: Running"));
    }
}
