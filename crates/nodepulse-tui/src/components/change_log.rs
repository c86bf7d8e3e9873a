//! Change log pane

use crate::action::Action;
use crate::components::Component;
use crate::ui_ext::ChangeTypeExt;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use nodepulse_core::{
    ChangeEvent, ChangeLog, FieldValue, format_clock, format_value, truncate_string,
};
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
};
use std::sync::{Arc, Mutex, PoisonError};

const HEADERS: [&str; 7] = [
    "TIME",
    "RESOURCE",
    "NAME",
    "CHANGE",
    "FIELD",
    "OLD VALUE",
    "NEW VALUE",
];

/// Width of the old and new value columns
const VALUE_WIDTH: u16 = 16;

/// Recent changes, newest first
pub struct ChangeLogComponent {
    log: Arc<Mutex<ChangeLog>>,
    table_state: TableState,
    focused: bool,
}

impl ChangeLogComponent {
    pub fn new(log: Arc<Mutex<ChangeLog>>) -> Self {
        Self {
            log,
            table_state: TableState::default(),
            focused: false,
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        if !focused {
            self.table_state.select(None);
        }
    }

    pub fn clear(&mut self) {
        self.lock().clear();
        self.table_state.select(None);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChangeLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scroll(&mut self, down: bool) {
        let len = self.lock().len();
        if len == 0 {
            return;
        }
        let next = match (self.table_state.selected(), down) {
            (None, _) => 0,
            (Some(i), true) => (i + 1).min(len - 1),
            (Some(i), false) => i.saturating_sub(1),
        };
        self.table_state.select(Some(next));
    }
}

fn event_row(event: &ChangeEvent) -> Row<'static> {
    Row::new(vec![
        Cell::from(format_clock(event.timestamp)),
        Cell::from(event.resource_kind.label()),
        Cell::from(event.resource_key.clone()),
        Cell::from(event.change_type.label())
            .style(Style::default().fg(event.change_type.color())),
        Cell::from(event.field.map(|f| f.label()).unwrap_or("-")),
        Cell::from(value_cell(event.old_value.as_ref())),
        Cell::from(value_cell(event.new_value.as_ref())),
    ])
}

fn value_cell(value: Option<&FieldValue>) -> String {
    truncate_string(&format_value(value), VALUE_WIDTH as usize)
}

impl Component for ChangeLogComponent {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.scroll(true),
            KeyCode::Char('k') | KeyCode::Up => self.scroll(false),
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        if action == Action::ClearChangeLog {
            self.clear();
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let border_color = if self.focused {
            Color::Cyan
        } else {
            Color::DarkGray
        };
        let (rows, total): (Vec<Row>, u64) = {
            let log = self.lock();
            (log.iter().map(event_row).collect(), log.total())
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Changes ({}) ", total))
            .border_style(Style::default().fg(border_color));

        if rows.is_empty() {
            let empty = Paragraph::new("No changes yet")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(empty, area);
            return Ok(());
        }

        let widths = [
            Constraint::Length(8),
            Constraint::Length(9),
            Constraint::Min(20),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(VALUE_WIDTH),
            Constraint::Length(VALUE_WIDTH),
        ];

        let table = Table::new(rows, widths)
            .header(
                Row::new(HEADERS)
                    .style(Style::default().add_modifier(Modifier::DIM))
                    .bottom_margin(1),
            )
            .block(block)
            .row_highlight_style(Style::default().bg(Color::DarkGray));

        frame.render_stateful_widget(table, area, &mut self.table_state);
        Ok(())
    }
}
