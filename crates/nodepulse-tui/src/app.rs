//! Application state and main loop

use crate::action::Action;
use crate::components::{
    ChangeLogComponent, Component, NodeDetailsComponent, NodesComponent, PodDetailsComponent,
    overlays,
};
use crate::journal::{ChangeJournal, ChangeRecorder};
use crate::tui::{self, Tui};
use chrono::{DateTime, Utc};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use nodepulse_core::{
    ChangeLog, ClusterSnapshot, CoordinatorEvent, FetchFailure, FilterCriteria, RefreshConfig,
    RefreshCoordinator, RefreshHandle, RefreshState, SnapshotSource, format_time_ago, project,
};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

type CoordinatorTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Startup options for [`App`]
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub refresh: RefreshConfig,
    pub criteria: FilterCriteria,
    pub change_log_size: usize,
    /// Append every change to this file
    pub journal: Option<PathBuf>,
}

/// Pane receiving navigation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Nodes,
    Changes,
}

/// Main application state
pub struct App {
    should_quit: bool,
    cluster_name: String,
    focus: Focus,
    nodes: NodesComponent,
    changes: ChangeLogComponent,
    /// Node detail overlay; scheduled refreshes are paused while open
    details: Option<NodeDetailsComponent>,
    /// Pod list of one namespace cell; also pauses scheduled refreshes
    pods: Option<PodDetailsComponent>,
    show_help: bool,
    /// Failure that opened the current error episode
    error: Option<FetchFailure>,
    handle: RefreshHandle,
    events_rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
    /// Spawned on the first call to `run`
    coordinator: Option<CoordinatorTask>,
    /// Criteria last handed to the coordinator
    criteria: FilterCriteria,
    /// Latest unfiltered snapshot, for re-projecting without a fetch
    snapshot: Option<Arc<ClusterSnapshot>>,
    last_update: Option<DateTime<Utc>>,
    retry_secs: u64,
    spinner_frame: usize,
    tick_rate: Duration,
}

impl App {
    pub fn new<S: SnapshotSource>(source: S, options: AppOptions) -> Self {
        let cluster_name = source.cluster_name();
        let change_log = Arc::new(Mutex::new(ChangeLog::with_capacity(options.change_log_size)));
        let journal = options.journal.and_then(|path| match ChangeJournal::open(&path) {
            Ok(journal) => {
                tracing::info!("Recording changes to {}", journal.path().display());
                Some(journal)
            }
            Err(e) => {
                tracing::warn!(
                    "Change journal disabled, cannot open {}: {}",
                    path.display(),
                    e
                );
                None
            }
        });
        let recorder = ChangeRecorder::new(Arc::clone(&change_log), journal);
        let retry_secs = options.refresh.retry_interval.as_secs();

        let (coordinator, handle, events_rx) = RefreshCoordinator::new(
            source,
            recorder,
            options.refresh,
            options.criteria.clone(),
        );

        Self {
            should_quit: false,
            cluster_name,
            focus: Focus::Nodes,
            nodes: NodesComponent::new(),
            changes: ChangeLogComponent::new(change_log),
            details: None,
            pods: None,
            show_help: false,
            error: None,
            handle,
            events_rx,
            coordinator: Some(Box::pin(coordinator.run())),
            criteria: options.criteria,
            snapshot: None,
            last_update: None,
            retry_secs,
            spinner_frame: 0,
            tick_rate: Duration::from_millis(100),
        }
    }

    /// Run the application
    pub async fn run(&mut self) -> Result<()> {
        if let Some(coordinator) = self.coordinator.take() {
            tokio::spawn(coordinator);
        }

        tui::install_panic_hook();
        let mut terminal = tui::init()?;

        let result = self.main_loop(&mut terminal).await;

        tui::restore()?;
        result
    }

    /// Main event loop
    async fn main_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        loop {
            terminal.draw(|frame| {
                if let Err(e) = self.draw(frame) {
                    tracing::error!("Draw failed: {}", e);
                }
            })?;

            // Handle events with timeout
            if event::poll(self.tick_rate)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = self.handle_key(key)? {
                            self.handle_action(action).await?;
                        }
                    }
                    Event::Resize(w, h) => {
                        self.handle_action(Action::Resize(w, h)).await?;
                    }
                    _ => {}
                }
            } else {
                self.handle_action(Action::Tick).await?;
            }

            // Drain coordinator results (non-blocking)
            while let Ok(event) = self.events_rx.try_recv() {
                self.handle_event(event);
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Route a key to whatever currently has input
    fn handle_key(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(Some(Action::Quit));
        }

        if self.show_help {
            return Ok(match key.code {
                KeyCode::Esc | KeyCode::Char('?') => Some(Action::ToggleHelp),
                KeyCode::Char('q') => Some(Action::Quit),
                _ => None,
            });
        }

        if let Some(details) = &mut self.details {
            return details.handle_key_event(key);
        }
        if let Some(pods) = &mut self.pods {
            return pods.handle_key_event(key);
        }

        if self.nodes.is_searching() {
            return self.nodes.handle_key_event(key);
        }

        match key.code {
            KeyCode::Char('q') => Ok(Some(Action::Quit)),
            KeyCode::Char('r') => Ok(Some(Action::Refresh)),
            KeyCode::Char('?') => Ok(Some(Action::ToggleHelp)),
            KeyCode::Char('c') => Ok(Some(Action::ClearChangeLog)),
            KeyCode::Tab => Ok(Some(Action::FocusNext)),
            _ => match self.focus {
                Focus::Nodes => self.nodes.handle_key_event(key),
                Focus::Changes => self.changes.handle_key_event(key),
            },
        }
    }

    /// Apply a message from the refresh coordinator
    fn handle_event(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Updated(update) => {
                tracing::debug!(
                    nodes = update.snapshot.len(),
                    changes = update.change_count,
                    "Snapshot received"
                );
                let draft = self.nodes.search_input();
                let view = if self.nodes.is_searching() && draft != self.criteria.search_query {
                    project(&update.snapshot, &self.criteria.clone().with_search(draft))
                } else {
                    update.view
                };
                self.nodes.set_view(view);
                if let Some(details) = &mut self.details {
                    details.refresh(&update.snapshot);
                }
                if let Some(pods) = &mut self.pods {
                    pods.refresh(self.nodes.view());
                }
                self.snapshot = Some(update.snapshot);
                self.last_update = Some(update.fetched_at);
            }
            CoordinatorEvent::ErrorRaised(failure) => {
                tracing::warn!(
                    category = failure.category.label(),
                    "Showing fetch error: {}",
                    failure.message
                );
                self.error = Some(failure);
            }
            CoordinatorEvent::ErrorCleared => {
                tracing::info!("Cluster reachable again");
                self.error = None;
            }
        }
    }

    /// Handle an action
    async fn handle_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => {
                self.should_quit = true;
            }
            Action::FocusNext => {
                self.focus = match self.focus {
                    Focus::Nodes => Focus::Changes,
                    Focus::Changes => Focus::Nodes,
                };
                self.nodes.set_focused(self.focus == Focus::Nodes);
                self.changes.set_focused(self.focus == Focus::Changes);
            }
            Action::Refresh => {
                if !self.handle.trigger_refresh() {
                    tracing::debug!("Refresh request dropped, one is already running");
                }
            }
            Action::ClearChangeLog => {
                self.changes.update(action)?;
            }
            Action::ShowNodeDetails(name) => {
                let node = self.snapshot.as_ref().and_then(|s| s.get(&name)).cloned();
                if let Some(node) = node {
                    self.details = Some(NodeDetailsComponent::new(node));
                    self.handle.set_suppressed(true);
                }
            }
            Action::CloseNodeDetails => {
                self.details = None;
                self.handle.set_suppressed(false);
            }
            Action::ShowPodDetails { node, namespace } => {
                let view = self.nodes.view();
                if view.snapshot.contains(&node) {
                    self.pods = Some(PodDetailsComponent::new(node, namespace, view));
                    self.handle.set_suppressed(true);
                }
            }
            Action::ClosePodDetails => {
                self.pods = None;
                self.handle.set_suppressed(false);
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
            }
            Action::SearchChanged(query) => {
                let preview = self.criteria.clone().with_search(query);
                self.reproject(&preview);
            }
            Action::SearchCommitted(query) => self.commit_search(query),
            Action::SearchCleared => self.commit_search(String::new()),
            Action::Tick => {
                if self.handle.is_refreshing() {
                    self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
                }
            }
            Action::Resize(_, _) => {}
        }
        Ok(())
    }

    fn commit_search(&mut self, query: String) {
        self.criteria = self.criteria.clone().with_search(query);
        self.handle.set_criteria(self.criteria.clone());
        let criteria = self.criteria.clone();
        self.reproject(&criteria);
    }

    fn reproject(&mut self, criteria: &FilterCriteria) {
        if let Some(snapshot) = &self.snapshot {
            self.nodes.set_view(project(snapshot, criteria));
        }
    }

    fn draw(&mut self, frame: &mut Frame) -> Result<()> {
        let area = frame.area();
        let chunks = Layout::vertical([
            Constraint::Length(1),      // Header
            Constraint::Percentage(60), // Nodes
            Constraint::Min(6),         // Changes
            Constraint::Length(1),      // Footer
        ])
        .split(area);

        self.draw_header(frame, chunks[0]);
        self.nodes.draw(frame, chunks[1])?;
        self.changes.draw(frame, chunks[2])?;
        self.draw_footer(frame, chunks[3]);

        if let Some(details) = &mut self.details {
            details.draw(frame, area)?;
        }
        if let Some(pods) = &mut self.pods {
            pods.draw(frame, area)?;
        }
        if let Some(failure) = &self.error {
            overlays::draw_error(frame, area, failure, self.retry_secs);
        }
        if self.show_help {
            overlays::draw_help(frame, area);
        }
        Ok(())
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let view = self.nodes.view();
        let mut spans = vec![
            Span::styled(" nodepulse ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled("│ ", Style::default().fg(Color::DarkGray)),
            Span::styled(self.cluster_name.as_str(), Style::default().fg(Color::Cyan)),
            Span::styled(" │ ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!(
                "{} nodes, {} pods",
                view.nodes.len(),
                view.snapshot.pod_count()
            )),
        ];
        if self.criteria.has_namespace_filter() {
            spans.push(Span::styled(
                " (namespaces filtered)",
                Style::default().fg(Color::DarkGray),
            ));
        }
        spans.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));

        if self.handle.is_refreshing() {
            spans.push(Span::styled(
                format!("{} refreshing", SPINNER_FRAMES[self.spinner_frame]),
                Style::default().fg(Color::Yellow),
            ));
        } else if self.handle.state() == RefreshState::ErrorBackoff {
            spans.push(Span::styled("retrying", Style::default().fg(Color::Red)));
        } else if let Some(at) = self.last_update {
            spans.push(Span::styled(
                format!("updated {}", format_time_ago(at, Utc::now())),
                Style::default().fg(Color::DarkGray),
            ));
        }

        if self.handle.is_suppressed() {
            spans.push(Span::styled(" (paused)", Style::default().fg(Color::DarkGray)));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let key = |k: &'static str| Span::styled(k, Style::default().add_modifier(Modifier::BOLD));
        let line = Line::from(vec![
            key("[↑↓]"),
            Span::raw(" select "),
            key("[←→]"),
            Span::raw(" namespace "),
            key("[Enter]"),
            Span::raw(" details "),
            key("[Tab]"),
            Span::raw(" pane "),
            key("[/]"),
            Span::raw(" search "),
            key("[r]"),
            Span::raw(" refresh "),
            key("[c]"),
            Span::raw(" clear "),
            key("[?]"),
            Span::raw(" help "),
            key("[q]"),
            Span::raw(" quit"),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodepulse_core::{
        ErrorCategory, FetchError, NodeSnapshot, PodPhase, PodSnapshot, SnapshotUpdate,
    };
    use ratatui::{Terminal, backend::TestBackend};
    use std::collections::BTreeMap;

    struct StaticSource;

    impl SnapshotSource for StaticSource {
        async fn fetch(&self) -> Result<ClusterSnapshot, FetchError> {
            Ok(ClusterSnapshot::new())
        }

        fn cluster_name(&self) -> String {
            "test-cluster".to_string()
        }
    }

    fn app(criteria: FilterCriteria) -> App {
        App::new(
            StaticSource,
            AppOptions {
                refresh: RefreshConfig::default(),
                criteria,
                change_log_size: 10,
                journal: None,
            },
        )
    }

    fn snapshot() -> Arc<ClusterSnapshot> {
        let pod =
            |name: &str, ns: &str| PodSnapshot::new(name, ns, PodPhase::Running, BTreeMap::new());
        let node = NodeSnapshot::new("node1", true, "v1.30.0", Utc::now())
            .with_pod(pod("web-1", "default"))
            .with_pod(pod("db-1", "default"))
            .with_pod(pod("dns", "kube-system"));
        Arc::new([node].into_iter().collect())
    }

    fn update(app: &App, snapshot: Arc<ClusterSnapshot>) -> CoordinatorEvent {
        CoordinatorEvent::Updated(SnapshotUpdate {
            view: project(&snapshot, &app.criteria),
            snapshot,
            change_count: 0,
            fetched_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_details_open_and_close() {
        let mut app = app(FilterCriteria::default());
        let event = update(&app, snapshot());
        app.handle_event(event);

        app.handle_action(Action::ShowNodeDetails("missing".to_string()))
            .await
            .unwrap();
        assert!(app.details.is_none());

        app.handle_action(Action::ShowNodeDetails("node1".to_string()))
            .await
            .unwrap();
        assert_eq!(app.details.as_ref().map(|d| d.node_name()), Some("node1"));

        app.handle_action(Action::CloseNodeDetails).await.unwrap();
        assert!(app.details.is_none());
    }

    #[tokio::test]
    async fn test_search_preview_then_commit() {
        let mut app = app(FilterCriteria::default());
        let event = update(&app, snapshot());
        app.handle_event(event);

        app.handle_action(Action::SearchChanged("web".to_string()))
            .await
            .unwrap();
        assert_eq!(app.nodes.view().snapshot.pod_count(), 1);
        assert_eq!(app.criteria.search_query, "");

        app.handle_action(Action::SearchCommitted("web".to_string()))
            .await
            .unwrap();
        assert_eq!(app.criteria.search_query, "web");

        app.handle_action(Action::SearchCleared).await.unwrap();
        assert_eq!(app.nodes.view().snapshot.pod_count(), 3);
    }

    #[tokio::test]
    async fn test_search_keeps_namespace_filter() {
        let mut app = app(FilterCriteria::from_namespace_args(["-kube-system"]));
        let event = update(&app, snapshot());
        app.handle_event(event);
        assert_eq!(app.nodes.view().snapshot.pod_count(), 2);

        app.handle_action(Action::SearchCommitted("d".to_string()))
            .await
            .unwrap();
        assert_eq!(app.nodes.view().snapshot.pod_count(), 1);
        assert!(app.criteria.exclude_namespaces.contains("kube-system"));
    }

    fn render(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| app.draw(frame).unwrap()).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[tokio::test]
    async fn test_pod_details_open_refresh_and_close() {
        let mut app = app(FilterCriteria::default());
        let event = update(&app, snapshot());
        app.handle_event(event);

        let show = |node: &str| Action::ShowPodDetails {
            node: node.to_string(),
            namespace: "default".to_string(),
        };
        app.handle_action(show("missing")).await.unwrap();
        assert!(app.pods.is_none());
        assert!(!app.handle.is_suppressed());

        app.handle_action(show("node1")).await.unwrap();
        let pods = app.pods.as_ref().unwrap();
        assert_eq!((pods.node_name(), pods.namespace()), ("node1", "default"));
        assert!(app.handle.is_suppressed());
        assert!(render(&mut app).contains("(paused)"));

        // Keys go to the overlay while it is open
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(app.handle_key(esc).unwrap(), Some(Action::ClosePodDetails));

        let event = update(&app, snapshot());
        app.handle_event(event);
        assert!(app.pods.is_some());

        app.handle_action(Action::ClosePodDetails).await.unwrap();
        assert!(app.pods.is_none());
        assert!(!app.handle.is_suppressed());
    }

    #[test]
    fn test_error_overlay_follows_events() {
        let mut app = app(FilterCriteria::default());
        let failure = FetchFailure::from(&FetchError::Transport("connection refused".to_string()));
        app.handle_event(CoordinatorEvent::ErrorRaised(failure));
        let error = app.error.as_ref().unwrap();
        assert_eq!(error.category, ErrorCategory::Network);
        assert!(render(&mut app).contains("Cluster unreachable: Network"));

        app.handle_event(CoordinatorEvent::ErrorCleared);
        assert!(app.error.is_none());
    }

    #[test]
    fn test_header_marks_namespace_filter() {
        let mut plain = app(FilterCriteria::default());
        assert!(!render(&mut plain).contains("namespaces filtered"));

        let mut filtered = app(FilterCriteria::from_namespace_args(["-kube-system"]));
        assert!(render(&mut filtered).contains("namespaces filtered"));
    }

    #[test]
    fn test_help_captures_keys() {
        let mut app = app(FilterCriteria::default());
        app.show_help = true;
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);

        assert_eq!(app.handle_key(key(KeyCode::Char('r'))).unwrap(), None);
        assert_eq!(
            app.handle_key(key(KeyCode::Esc)).unwrap(),
            Some(Action::ToggleHelp)
        );
    }
}
