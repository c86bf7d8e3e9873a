//! Nodes table
//!
//! One row per node with its status, kubelet version, age, pod count and
//! a column of pod health symbols for every visible namespace. Left and
//! right move between namespace cells; Enter on a namespace cell opens its
//! pods, anywhere else the node. Also owns the search bar.

use crate::action::Action;
use crate::components::Component;
use crate::ui_ext::{HealthIndicatorExt, ready_color};
use chrono::Utc;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use nodepulse_core::{FilteredView, PodIndicator, format_age};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
};

const FIXED_HEADERS: [&str; 5] = ["NAME", "STATUS", "VERSION", "AGE", "PODS"];

/// Input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Normal,
    Searching,
}

/// Nodes table component
#[derive(Default)]
pub struct NodesComponent {
    view: FilteredView,
    /// False until the first snapshot arrives
    loaded: bool,
    table_state: TableState,
    mode: Mode,
    /// Text in the search bar
    search_input: String,
    /// Namespace column under the cursor; `None` selects the node itself
    selected_namespace: Option<String>,
    focused: bool,
}

impl NodesComponent {
    pub fn new() -> Self {
        Self {
            focused: true,
            ..Default::default()
        }
    }

    /// Replace the rendered view, keeping the selected node if it still exists
    pub fn set_view(&mut self, view: FilteredView) {
        let selected = self.selected_node().map(str::to_string);
        self.view = view;
        self.loaded = true;

        let index = selected
            .and_then(|name| self.view.nodes.iter().position(|n| n.name == name))
            .or_else(|| self.table_state.selected())
            .map(|i| i.min(self.view.nodes.len().saturating_sub(1)));

        if self.view.nodes.is_empty() {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(index.unwrap_or(0)));
        }

        let vanished = self
            .selected_namespace
            .as_ref()
            .is_some_and(|ns| !self.view.namespaces.contains(ns));
        if vanished {
            self.selected_namespace = None;
        }
        self.sync_column();
    }

    pub fn view(&self) -> &FilteredView {
        &self.view
    }

    pub fn selected_node(&self) -> Option<&str> {
        self.table_state
            .selected()
            .and_then(|i| self.view.nodes.get(i))
            .map(|n| n.name.as_str())
    }

    pub fn selected_namespace(&self) -> Option<&str> {
        self.selected_namespace.as_deref()
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn is_searching(&self) -> bool {
        self.mode == Mode::Searching
    }

    /// Query being typed, which may not be committed yet
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    fn select_next(&mut self) {
        if self.view.nodes.is_empty() {
            return;
        }
        let last = self.view.nodes.len() - 1;
        let next = self.table_state.selected().map_or(0, |i| (i + 1).min(last));
        self.table_state.select(Some(next));
    }

    fn select_prev(&mut self) {
        if self.view.nodes.is_empty() {
            return;
        }
        let prev = self
            .table_state
            .selected()
            .map_or(0, |i| i.saturating_sub(1));
        self.table_state.select(Some(prev));
    }

    /// Move the cursor between namespace columns; left of the first one is
    /// the node itself
    fn move_column(&mut self, right: bool) {
        let namespaces: Vec<&String> = self.view.namespaces.iter().collect();
        let current = self
            .selected_namespace
            .as_ref()
            .and_then(|ns| namespaces.iter().position(|n| *n == ns));
        let next = match (current, right) {
            (None, true) => namespaces.first(),
            (None, false) => None,
            (Some(i), true) => namespaces.get(i + 1).or(namespaces.get(i)),
            (Some(i), false) => i.checked_sub(1).and_then(|i| namespaces.get(i)),
        };
        self.selected_namespace = next.map(|ns| ns.to_string());
        self.sync_column();
    }

    fn sync_column(&mut self) {
        let column = self.selected_namespace.as_ref().and_then(|ns| {
            self.view
                .namespaces
                .iter()
                .position(|n| n == ns)
                .map(|i| FIXED_HEADERS.len() + i)
        });
        self.table_state.select_column(column);
    }

    fn enter_action(&self) -> Option<Action> {
        let node = self.selected_node()?.to_string();
        Some(match &self.selected_namespace {
            Some(namespace) => Action::ShowPodDetails {
                node,
                namespace: namespace.clone(),
            },
            None => Action::ShowNodeDetails(node),
        })
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.select_next();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.select_prev();
                None
            }
            KeyCode::Char('g') | KeyCode::Home => {
                if !self.view.nodes.is_empty() {
                    self.table_state.select(Some(0));
                }
                None
            }
            KeyCode::Char('G') | KeyCode::End => {
                if !self.view.nodes.is_empty() {
                    self.table_state.select(Some(self.view.nodes.len() - 1));
                }
                None
            }
            KeyCode::Char('l') | KeyCode::Right => {
                self.move_column(true);
                None
            }
            KeyCode::Char('h') | KeyCode::Left => {
                self.move_column(false);
                None
            }
            KeyCode::Enter => self.enter_action(),
            KeyCode::Char('/') => {
                self.mode = Mode::Searching;
                None
            }
            _ => None,
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.search_input.clear();
                Some(Action::SearchCleared)
            }
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                Some(Action::SearchCommitted(self.search_input.clone()))
            }
            KeyCode::Backspace => {
                self.search_input.pop();
                Some(Action::SearchChanged(self.search_input.clone()))
            }
            KeyCode::Char(c) => {
                self.search_input.push(c);
                Some(Action::SearchChanged(self.search_input.clone()))
            }
            _ => None,
        }
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::styled("Search: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(self.search_input.as_str()),
        ];
        if self.is_searching() {
            spans.push(Span::styled("█", Style::default().fg(Color::Cyan)));
        }
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("[{} pods]", self.view.snapshot.pod_count()),
            Style::default().fg(Color::DarkGray),
        ));

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_table(&mut self, frame: &mut Frame, area: Rect) {
        let border_color = if self.focused {
            Color::Cyan
        } else {
            Color::DarkGray
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Nodes ")
            .border_style(Style::default().fg(border_color));

        if !self.loaded {
            let waiting = Paragraph::new("Waiting for first snapshot...")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(waiting, area);
            return;
        }

        let header = Row::new(
            FIXED_HEADERS
                .iter()
                .map(|h| Cell::from(*h))
                .chain(
                    self.view
                        .namespaces
                        .iter()
                        .map(|ns| Cell::from(ns.to_uppercase())),
                ),
        )
        .style(Style::default().add_modifier(Modifier::DIM))
        .bottom_margin(1);

        let now = Utc::now();
        let rows = self.view.nodes.iter().map(|node| {
            let mut cells = vec![
                Cell::from(node.name.clone()),
                Cell::from(node.status_label())
                    .style(Style::default().fg(ready_color(node.ready))),
                Cell::from(node.kubelet_version.clone()),
                Cell::from(format_age(node.creation_time, now)),
                Cell::from(node.pod_count.clone()),
            ];
            cells.extend(self.view.namespaces.iter().map(|ns| {
                Cell::from(indicator_line(self.view.indicators_for(&node.name, ns)))
            }));
            Row::new(cells)
        });

        let table = Table::new(rows, self.column_widths())
            .header(header)
            .block(block)
            .row_highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )
            .cell_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");

        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn column_widths(&self) -> Vec<Constraint> {
        let name_width = self
            .view
            .nodes
            .iter()
            .map(|n| n.name.len())
            .max()
            .unwrap_or(0)
            .max(FIXED_HEADERS[0].len());
        let pods_width = self
            .view
            .nodes
            .iter()
            .map(|n| n.pod_count.len())
            .max()
            .unwrap_or(0)
            .max(FIXED_HEADERS[4].len());

        let mut widths = vec![
            Constraint::Length(name_width as u16),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(5),
            Constraint::Length(pods_width as u16),
        ];
        widths.extend(self.view.namespaces.iter().map(|ns| {
            let most = self
                .view
                .nodes
                .iter()
                .map(|n| self.view.indicators_for(&n.name, ns).len())
                .max()
                .unwrap_or(0);
            // Each symbol takes a cell plus a separating space
            Constraint::Length(ns.len().max(most * 2) as u16)
        }));
        widths
    }
}

/// Colored health symbols for one namespace cell
fn indicator_line(indicators: &[PodIndicator]) -> Line<'static> {
    let spans: Vec<Span<'static>> = indicators
        .iter()
        .flat_map(|indicator| {
            let (symbol, color) = indicator.health.symbol_and_color();
            [
                Span::styled(symbol, Style::default().fg(color)),
                Span::raw(" "),
            ]
        })
        .collect();
    Line::from(spans)
}

impl Component for NodesComponent {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        Ok(match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Searching => self.handle_search_key(key),
        })
    }

    fn update(&mut self, _action: Action) -> Result<Option<Action>> {
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let show_search = self.is_searching() || !self.search_input.is_empty();
        let chunks = Layout::vertical([
            Constraint::Length(u16::from(show_search)), // Search bar
            Constraint::Min(3),                         // Table
        ])
        .split(area);

        if show_search {
            self.draw_search_bar(frame, chunks[0]);
        }
        self.draw_table(frame, chunks[1]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crossterm::event::KeyModifiers;
    use nodepulse_core::{
        ClusterSnapshot, FilterCriteria, NodeSnapshot, PodPhase, PodSnapshot, project,
    };
    use ratatui::{Terminal, backend::TestBackend};
    use std::collections::BTreeMap;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn view() -> FilteredView {
        let created = Utc::now();
        let snapshot: ClusterSnapshot = ["alpha", "beta", "gamma"]
            .into_iter()
            .map(|name| {
                NodeSnapshot::new(name, name != "beta", "v1.30.0", created).with_pod(
                    PodSnapshot::new(
                        format!("{}-web", name),
                        "default",
                        PodPhase::Running,
                        BTreeMap::new(),
                    ),
                )
            })
            .collect();
        project(&snapshot, &FilterCriteria::default())
    }

    fn component() -> NodesComponent {
        let mut nodes = NodesComponent::new();
        nodes.set_view(view());
        nodes
    }

    #[test]
    fn test_navigation_and_details() {
        let mut nodes = component();
        assert_eq!(nodes.selected_node(), Some("alpha"));

        nodes.handle_key_event(key(KeyCode::Down)).unwrap();
        nodes.handle_key_event(key(KeyCode::Char('j'))).unwrap();
        nodes.handle_key_event(key(KeyCode::Down)).unwrap();
        assert_eq!(nodes.selected_node(), Some("gamma"));

        let action = nodes.handle_key_event(key(KeyCode::Enter)).unwrap();
        assert_eq!(action, Some(Action::ShowNodeDetails("gamma".to_string())));
    }

    #[test]
    fn test_enter_on_namespace_cell_opens_pods() {
        let mut nodes = component();
        nodes.handle_key_event(key(KeyCode::Down)).unwrap();

        nodes.handle_key_event(key(KeyCode::Right)).unwrap();
        assert_eq!(nodes.selected_namespace(), Some("default"));
        assert_eq!(
            nodes.table_state.selected_column(),
            Some(FIXED_HEADERS.len())
        );
        // Only one namespace, so the cursor stays on it
        nodes.handle_key_event(key(KeyCode::Char('l'))).unwrap();
        assert_eq!(nodes.selected_namespace(), Some("default"));

        let action = nodes.handle_key_event(key(KeyCode::Enter)).unwrap();
        assert_eq!(
            action,
            Some(Action::ShowPodDetails {
                node: "beta".to_string(),
                namespace: "default".to_string(),
            })
        );

        nodes.handle_key_event(key(KeyCode::Left)).unwrap();
        assert_eq!(nodes.selected_namespace(), None);
        assert_eq!(nodes.table_state.selected_column(), None);
        let action = nodes.handle_key_event(key(KeyCode::Enter)).unwrap();
        assert_eq!(action, Some(Action::ShowNodeDetails("beta".to_string())));
    }

    #[test]
    fn test_vanished_namespace_drops_column() {
        let mut nodes = component();
        nodes.handle_key_event(key(KeyCode::Right)).unwrap();
        assert_eq!(nodes.selected_namespace(), Some("default"));

        let mut empty = view();
        empty.namespaces.clear();
        nodes.set_view(empty);
        assert_eq!(nodes.selected_namespace(), None);
        assert_eq!(nodes.table_state.selected_column(), None);
    }

    #[test]
    fn test_selection_follows_node_across_updates() {
        let mut nodes = component();
        nodes.handle_key_event(key(KeyCode::Down)).unwrap();
        assert_eq!(nodes.selected_node(), Some("beta"));

        let mut shrunk = view();
        shrunk.nodes.retain(|n| n.name != "alpha");
        nodes.set_view(shrunk);
        assert_eq!(nodes.selected_node(), Some("beta"));
    }

    #[test]
    fn test_search_edit_commit_and_clear() {
        let mut nodes = component();
        nodes.handle_key_event(key(KeyCode::Char('/'))).unwrap();
        assert!(nodes.is_searching());

        let action = nodes.handle_key_event(key(KeyCode::Char('w'))).unwrap();
        assert_eq!(action, Some(Action::SearchChanged("w".to_string())));
        nodes.handle_key_event(key(KeyCode::Char('x'))).unwrap();
        let action = nodes.handle_key_event(key(KeyCode::Backspace)).unwrap();
        assert_eq!(action, Some(Action::SearchChanged("w".to_string())));

        let action = nodes.handle_key_event(key(KeyCode::Enter)).unwrap();
        assert_eq!(action, Some(Action::SearchCommitted("w".to_string())));
        assert!(!nodes.is_searching());
        assert_eq!(nodes.search_input(), "w");

        nodes.handle_key_event(key(KeyCode::Char('/'))).unwrap();
        let action = nodes.handle_key_event(key(KeyCode::Esc)).unwrap();
        assert_eq!(action, Some(Action::SearchCleared));
        assert_eq!(nodes.search_input(), "");
    }

    #[test]
    fn test_search_mode_swallows_shortcuts() {
        let mut nodes = component();
        nodes.handle_key_event(key(KeyCode::Char('/'))).unwrap();
        let action = nodes.handle_key_event(key(KeyCode::Char('j'))).unwrap();
        assert_eq!(action, Some(Action::SearchChanged("j".to_string())));
        assert_eq!(nodes.selected_node(), Some("alpha"));
    }

    #[test]
    fn test_draw_renders_rows_and_namespaces() {
        let mut nodes = component();
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal
            .draw(|frame| {
                nodes.draw(frame, frame.area()).unwrap();
            })
            .unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("NotReady"));
        assert!(text.contains("DEFAULT"));
        assert!(text.contains("gamma"));
        assert!(text.contains("●"));
    }
}
