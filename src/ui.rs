use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use formgrid::{export, CsvSink, GridWidget, MemoryGrid, Record, SyncedTable, TableStore};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

pub type RecordTable = SyncedTable<Record, MemoryGrid<Record>>;

pub struct App {
    pub table: RecordTable,
    pub state: TableState,
    pub show_detail: bool,
    pub status: String,
    sink: Box<dyn CsvSink>,
}

impl App {
    pub fn new(store: TableStore<Record>, sink: Box<dyn CsvSink>) -> Self {
        let table = SyncedTable::new(store, MemoryGrid::default());
        let mut state = TableState::default();
        if table.grid().len() > 0 {
            state.select(Some(0));
        }

        App {
            table,
            state,
            show_detail: false,
            status: String::from("Ready"),
            sink,
        }
    }

    pub fn into_store(self) -> TableStore<Record> {
        self.table.into_parts().0
    }

    /// Column names in order of first appearance across all rows
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for record in self.table.grid().rows() {
            for column in record.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }
        columns
    }

    pub fn current_record(&self) -> Option<&Record> {
        self.state.selected().and_then(|i| self.table.grid().rows().get(i))
    }

    // ------------------------------------------------------------------------
    // Selection and data
    // ------------------------------------------------------------------------

    pub fn toggle_current(&mut self) {
        if let Some(i) = self.state.selected() {
            self.table.widget_mut(|grid| grid.toggle(i));
            self.table.tick();
        }
    }

    /// Select everything, or clear when everything is already selected
    pub fn toggle_all(&mut self) {
        let all = self.table.store().is_all_selected();
        self.table.widget_mut(|grid| {
            if all {
                grid.deselect_all();
            } else {
                grid.select_all();
            }
        });
        self.table.tick();
    }

    pub fn delete_selected(&mut self) {
        let removed = self.table.store_mut(|store| store.remove_selected_rows());
        self.table.tick();
        self.clamp_cursor();
        self.status = format!("Deleted {} rows", removed);
    }

    pub fn clear_all(&mut self) {
        self.table.store_mut(|store| store.clear_all_data());
        self.table.tick();
        self.clamp_cursor();
        self.status = String::from("Cleared all data");
    }

    /// Export the selection, or every row when nothing is selected
    pub fn export(&mut self) {
        let store = self.table.store();
        let (records, scope) = if store.selected_count() > 0 {
            (store.selected_rows(), "selected")
        } else {
            (store.all_rows(), "all")
        };

        self.status = match export(records, None, self.sink.as_ref()) {
            Ok(filename) => format!("Exported {} {} rows to {}", records.len(), scope, filename),
            Err(e) => format!("Export failed: {}", e),
        };
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn next(&mut self) {
        let len = self.table.grid().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.table.grid().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.table.grid().len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 20).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(20));
        self.state.select(Some(i));
    }

    fn clamp_cursor(&mut self) {
        let len = self.table.grid().len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            Some(_) => {}
        }
    }

    /// Apply one key press; returns false when the app should quit
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Enter => self.show_detail = !self.show_detail,
            KeyCode::Char(' ') => self.toggle_current(),
            KeyCode::Char('a') => self.toggle_all(),
            KeyCode::Char('d') => self.delete_selected(),
            KeyCode::Char('c') => self.clear_all(),
            KeyCode::Char('e') => self.export(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::Home if !self.table.grid().is_empty() => self.state.select(Some(0)),
            KeyCode::End if !self.table.grid().is_empty() => {
                self.state.select(Some(self.table.grid().len() - 1))
            }
            _ => {}
        }
        true
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if !app.handle_key(key.code) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Grid
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail {
        let content = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[1]);
        render_table(f, content[0], app);
        render_detail_panel(f, content[1], app);
    } else {
        render_table(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let store = app.table.store();
    let selection = if store.is_all_selected() {
        ("all", Color::Green)
    } else if store.is_indeterminate() {
        ("some", Color::Yellow)
    } else {
        ("none", Color::DarkGray)
    };

    let spans = vec![
        Span::styled(
            " CSV Table ",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(format!("Rows: {}", store.total_count()), Style::default().fg(Color::White)),
        Span::raw(" | "),
        Span::styled(
            format!("Selected: {}", store.selected_count()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" ("),
        Span::styled(selection.0, Style::default().fg(selection.1)),
        Span::raw(")"),
    ];

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let columns = app.columns();

    let header_cells = std::iter::once(String::from("✓"))
        .chain(columns.iter().cloned())
        .map(|h| {
            Cell::from(h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let grid = app.table.grid();
    let rows = grid.rows().iter().enumerate().map(|(i, record)| {
        let mark = if grid.is_selected(i) { "[x]" } else { "[ ]" };
        let mut cells = vec![Cell::from(mark).style(Style::default().fg(Color::Cyan))];
        for column in &columns {
            let cell = match record.get(column) {
                Some(value) if value.is_number() => {
                    Cell::from(value.to_string()).style(Style::default().fg(Color::Green))
                }
                Some(value) => Cell::from(truncate(&value.to_string(), 24)),
                None => Cell::from(""),
            };
            cells.push(cell);
        }
        Row::new(cells).height(1)
    });

    let widths: Vec<Constraint> = std::iter::once(Constraint::Length(4))
        .chain(columns.iter().map(|_| Constraint::Min(8)))
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Records "),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let lines: Vec<Line> = match app.current_record() {
        Some(record) => {
            let mut lines = vec![Line::from(vec![
                Span::styled("id: ", Style::default().fg(Color::DarkGray)),
                Span::raw(record.id.to_string()),
            ])];
            for (column, value) in record.fields() {
                lines.push(Line::from(vec![
                    Span::styled(format!("{}: ", column), Style::default().fg(Color::Yellow)),
                    Span::raw(value.to_string()),
                ]));
            }
            lines
        }
        None => vec![Line::from("No row selected")],
    };

    let panel =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Detail "));
    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let row = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let mut spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", row, app.table.grid().len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("| "),
        Span::styled(app.status.clone(), Style::default().fg(Color::Green)),
        Span::raw(" | "),
    ];
    for (key, label) in [
        ("Space", " Select | "),
        ("a", " All | "),
        ("d", " Delete | "),
        ("e", " Export | "),
        ("Enter", " Detail | "),
    ] {
        spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(label));
    }
    spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
