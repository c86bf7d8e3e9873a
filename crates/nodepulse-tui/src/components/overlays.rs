//! Help and error overlays

use crate::components::centered_rect;
use nodepulse_core::FetchFailure;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

/// Key bindings shown in the help overlay
pub const HELP_KEYS: &[(&str, &str)] = &[
    ("↑/k ↓/j", "move selection"),
    ("←/h →/l", "move between namespace columns"),
    ("Enter", "details of the node or namespace cell"),
    ("Tab", "switch between nodes and changes"),
    ("/", "search pods by name"),
    ("Esc", "clear search / close overlay"),
    ("r", "refresh now"),
    ("c", "clear change log"),
    ("?", "toggle this help"),
    ("q", "quit"),
];

pub fn draw_help(frame: &mut Frame, area: Rect) {
    let key_width = HELP_KEYS
        .iter()
        .map(|(k, _)| k.chars().count())
        .max()
        .unwrap_or(0);
    let lines: Vec<Line> = HELP_KEYS
        .iter()
        .map(|(key, description)| {
            Line::from(vec![
                Span::styled(
                    format!("  {:width$}  ", key, width = key_width),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(*description),
            ])
        })
        .collect();

    let area = centered_rect(50, lines.len() as u16 + 2, area);
    frame.render_widget(Clear, area);
    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Keys ")
            .border_style(Style::default().fg(Color::Gray)),
    );
    frame.render_widget(help, area);
}

/// Persistent fetch error; stays up until a refresh succeeds
pub fn draw_error(frame: &mut Frame, area: Rect, failure: &FetchFailure, retry_secs: u64) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            failure.message.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Retrying every {}s. Press [r] to retry now.", retry_secs),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let area = centered_rect(60, 8, area);
    frame.render_widget(Clear, area);
    let error = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Cluster unreachable: {} ", failure.category.label()))
            .border_style(Style::default().fg(Color::Red)),
    );
    frame.render_widget(error, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodepulse_core::ErrorCategory;
    use ratatui::{Terminal, backend::TestBackend};

    fn render(draw: impl FnOnce(&mut Frame)) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(draw).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_error_overlay_shows_message_and_category() {
        let failure = FetchFailure {
            message: "Connection refused".to_string(),
            category: ErrorCategory::Network,
        };
        let text = render(|frame| draw_error(frame, frame.area(), &failure, 5));
        assert!(text.contains("Connection refused"));
        assert!(text.contains("Cluster unreachable: Network"));
        assert!(text.contains("Retrying every 5s"));
    }

    #[test]
    fn test_help_lists_quit() {
        let text = render(|frame| draw_help(frame, frame.area()));
        assert!(text.contains("quit"));
    }
}
