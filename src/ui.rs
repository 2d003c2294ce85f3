use crate::db::{CandidateStat, StoredEmail};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Emails,
    Candidates,
    Views,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterType {
    All,
    Matched,
    Unmatched,
    Override,
    /// Emails resolved to one candidate (set by drilling in)
    Candidate(String),
}

impl FilterType {
    pub fn label(&self) -> &str {
        match self {
            FilterType::All => "ALL",
            FilterType::Matched => "MATCHED",
            FilterType::Unmatched => "UNMATCHED",
            FilterType::Override => "OVERRIDE",
            FilterType::Candidate(name) => name,
        }
    }

    pub fn accepts(&self, email: &StoredEmail) -> bool {
        match self {
            FilterType::All => true,
            FilterType::Matched => email.is_matched(),
            FilterType::Unmatched => !email.is_matched(),
            FilterType::Override => email.is_matched() && email.is_override(),
            FilterType::Candidate(name) => email.candidate_name.as_deref() == Some(name.as_str()),
        }
    }
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Emails => Page::Candidates,
            Page::Candidates => Page::Views,
            Page::Views => Page::Emails,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Emails => Page::Views,
            Page::Candidates => Page::Emails,
            Page::Views => Page::Candidates,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Emails => "Linked Emails",
            Page::Candidates => "Candidates",
            Page::Views => "Views",
        }
    }
}

pub struct App {
    pub emails: Vec<StoredEmail>,
    pub filtered_emails: Vec<StoredEmail>,
    pub candidate_stats: Vec<CandidateStat>,
    pub state: TableState,
    pub candidates_state: TableState,
    pub total_count: i64,
    pub current_page: Page,
    pub show_detail: bool,
    pub active_filter: FilterType,
}

impl App {
    pub fn new(emails: Vec<StoredEmail>, candidate_stats: Vec<CandidateStat>, total_count: i64) -> Self {
        let mut state = TableState::default();
        if !emails.is_empty() {
            state.select(Some(0));
        }

        let mut candidates_state = TableState::default();
        if !candidate_stats.is_empty() {
            candidates_state.select(Some(0));
        }

        let filtered_emails = emails.clone();

        Self {
            emails,
            filtered_emails,
            candidate_stats,
            state,
            candidates_state,
            total_count,
            current_page: Page::Emails,
            show_detail: false,
            active_filter: FilterType::All,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_email(&self) -> Option<&StoredEmail> {
        self.state.selected().and_then(|i| self.filtered_emails.get(i))
    }

    pub fn apply_filter(&mut self, filter: FilterType) {
        self.filtered_emails = self
            .emails
            .iter()
            .filter(|e| filter.accepts(e))
            .cloned()
            .collect();
        self.active_filter = filter;

        // Reset selection to first item
        if !self.filtered_emails.is_empty() {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    pub fn clear_filter(&mut self) {
        self.apply_filter(FilterType::All);
    }

    /// Show only the emails of the candidate selected on the Candidates page
    pub fn drill_into_candidate(&mut self) {
        let name = match self
            .candidates_state
            .selected()
            .and_then(|i| self.candidate_stats.get(i))
        {
            Some(stat) => stat.candidate_name.clone(),
            None => return,
        };

        self.apply_filter(FilterType::Candidate(name));
        self.current_page = Page::Emails;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn active_table(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Candidates => (&mut self.candidates_state, self.candidate_stats.len()),
            _ => (&mut self.state, self.filtered_emails.len()),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => (i + 20).min(len - 1),
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| i.saturating_sub(20));
        state.select(Some(i));
    }

    pub fn home(&mut self) {
        let (state, len) = self.active_table();
        if len > 0 {
            state.select(Some(0));
        }
    }

    pub fn end(&mut self) {
        let (state, len) = self.active_table();
        if len > 0 {
            state.select(Some(len - 1));
        }
    }

    pub fn stats(&self) -> EmailStats {
        let mut stats = EmailStats::default();

        for email in &self.emails {
            if email.is_matched() {
                stats.matched_count += 1;
                if email.is_override() {
                    stats.override_count += 1;
                }
            } else {
                stats.unmatched_count += 1;
            }
        }

        stats
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct EmailStats {
    pub matched_count: usize,
    pub override_count: usize,
    pub unmatched_count: usize,
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter if app.current_page == Page::Candidates => app.drill_into_candidate(),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('c') => {
                    app.clear_filter();
                    app.current_page = Page::Emails;
                }
                KeyCode::Char(c @ '1'..='4') if app.current_page == Page::Views => {
                    let filter = match c {
                        '1' => FilterType::All,
                        '2' => FilterType::Matched,
                        '3' => FilterType::Unmatched,
                        _ => FilterType::Override,
                    };
                    app.apply_filter(filter);
                    app.current_page = Page::Emails;
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.home(),
                KeyCode::End => app.end(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Emails {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(60), // Email list
                Constraint::Percentage(40), // Detail panel
            ])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Emails => render_table(f, chunks[1], app),
            Page::Candidates => render_candidates(f, chunks[1], app),
            Page::Views => render_views(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let stats = app.stats();
    let pages = [Page::Emails, Page::Candidates, Page::Views];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Total: {}", app.total_count),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("✓ {}", stats.matched_count),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("✗ {}", stats.unmatched_count),
        Style::default().fg(Color::Red),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn status_color(email: &StoredEmail) -> Color {
    match (email.match_status.as_str(), email.match_method.as_deref()) {
        ("matched", Some("override")) => Color::Cyan,
        ("matched", _) => Color::Green,
        ("below_threshold", _) => Color::Yellow,
        _ => Color::Red,
    }
}

fn header_row(titles: &[&str]) -> Row<'static> {
    let cells: Vec<Cell> = titles
        .iter()
        .map(|h| {
            Cell::from(h.to_string()).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        })
        .collect();

    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header = header_row(&["Date", "Sender", "Candidate", "Method", "Score", "Subject"]);

    let rows = app.filtered_emails.iter().map(|email| {
        let color = status_color(email);
        let candidate = email
            .candidate_name
            .clone()
            .unwrap_or_else(|| email.match_status.clone());

        let cells = vec![
            Cell::from(truncate(&email.date, 16)),
            Cell::from(truncate(&email.sender, 32)),
            Cell::from(truncate(&candidate, 26)).style(Style::default().fg(color)),
            Cell::from(email.match_method.clone().unwrap_or_default()).style(Style::default().fg(color)),
            Cell::from(email.match_score.map(|s| s.to_string()).unwrap_or_default()),
            Cell::from(truncate(&email.subject, 40)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(34),
            Constraint::Length(28),
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Min(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Linked Emails "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_candidates(f: &mut Frame, area: Rect, app: &mut App) {
    let header = header_row(&["Candidate", "FEC ID", "Party", "State", "Emails"]);

    let rows = app.candidate_stats.iter().map(|stat| {
        let cells = vec![
            Cell::from(truncate(&stat.candidate_name, 32)),
            Cell::from(stat.candidate_id.clone().unwrap_or_else(|| "-".to_string())),
            Cell::from(truncate(stat.party.as_deref().unwrap_or("-"), 26)),
            Cell::from(stat.state.clone().unwrap_or_else(|| "-".to_string())),
            Cell::from(stat.email_count.to_string()).style(Style::default().fg(Color::Green)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(34),
            Constraint::Length(12),
            Constraint::Length(28),
            Constraint::Length(7),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Candidates - Emails per Candidate (Enter to drill in) "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.candidates_state);
}

fn render_views(f: &mut Frame, area: Rect, app: &App) {
    let stats = app.stats();

    let view_line = |key: &'static str, filter: &FilterType, label: &'static str, count: String, color: Color| {
        Line::from(vec![
            Span::raw("  "),
            if app.active_filter == *filter {
                Span::styled("→", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
            } else {
                Span::raw(" ")
            },
            Span::styled(key, Style::default().fg(Color::Yellow)),
            Span::raw(format!(". {:<28}", label)),
            Span::styled(count, Style::default().fg(color)),
        ])
    };

    let hint = Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
    let key = Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC);

    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Quick Views & Filters",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        view_line("1", &FilterType::All, "All Emails", format!("{:>6}", app.emails.len()), Color::White),
        view_line("2", &FilterType::Matched, "Matched", format!("{:>6}", stats.matched_count), Color::Green),
        view_line("3", &FilterType::Unmatched, "Unmatched", format!("{:>6}", stats.unmatched_count), Color::Red),
        view_line("4", &FilterType::Override, "Matched by Override", format!("{:>6}", stats.override_count), Color::Cyan),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Hint: ", key),
            Span::styled("Press ", hint),
            Span::styled("1-4", key),
            Span::styled(" to filter, ", hint),
            Span::styled("c", key),
            Span::styled(" to clear", hint),
        ]),
    ];

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Views - Quick Access Filters "),
    );

    f.render_widget(paragraph, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let (selected, total) = match app.current_page {
        Page::Candidates => (
            app.candidates_state.selected().map(|i| i + 1).unwrap_or(0),
            app.candidate_stats.len(),
        ),
        _ => (
            app.state.selected().map(|i| i + 1).unwrap_or(0),
            app.filtered_emails.len(),
        ),
    };

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if app.active_filter != FilterType::All {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", app.active_filter.label()),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Details | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Fast | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Email Details ");

    let email = match app.selected_email() {
        Some(e) => e,
        None => {
            f.render_widget(Paragraph::new("No email selected").block(block), area);
            return;
        }
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let section = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let field = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(format!("  {}: ", name), label), Span::raw(value)])
    };
    let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    let mut content = vec![
        Line::from(""),
        field("Date", email.date.clone()),
        field("Sender", email.sender.clone()),
        field("Subject", email.subject.clone()),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(Span::styled("  RESOLUTION", section)),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Status: ", label),
            Span::styled(email.match_status.clone(), Style::default().fg(status_color(email))),
        ]),
        field("Method", or_dash(&email.match_method)),
        field(
            "Score",
            email.match_score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
        ),
        field("Candidate", or_dash(&email.candidate_name)),
        field("FEC ID", or_dash(&email.candidate_id)),
        field("Party", or_dash(&email.party)),
        field("State", or_dash(&email.state)),
        field(
            "Receipts",
            email
                .receipts
                .map(|r| format!("{:.2}", r))
                .unwrap_or_else(|| "-".to_string()),
        ),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(Span::styled(format!("  LINKS ({})", email.links.len()), section)),
        Line::from(""),
    ];

    for link in email.links.iter().take(10) {
        content.push(Line::from(Span::styled(
            format!("  {}", link),
            Style::default().fg(Color::Green),
        )));
    }

    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    let detail_panel = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(detail_panel, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn email(sender: &str, status: &str, method: Option<&str>, candidate: Option<&str>) -> StoredEmail {
        StoredEmail {
            id: sender.to_string(),
            date: "Mon, 1 Apr 2024 10:00:00 -0400".to_string(),
            sender: sender.to_string(),
            subject: "subject".to_string(),
            body: None,
            links: vec![],
            match_status: status.to_string(),
            match_method: method.map(str::to_string),
            match_score: None,
            candidate_name: candidate.map(str::to_string),
            candidate_id: None,
            party: None,
            state: None,
            receipts: None,
            resolved_at: Utc::now(),
        }
    }

    fn app() -> App {
        let emails = vec![
            email("a", "matched", Some("override"), Some("CASEY, ROBERT P. JR.")),
            email("b", "matched", Some("fuzzy"), Some("HAWLEY, JOSHUA DAVID SEN")),
            email("c", "no_address", None, None),
            email("d", "below_threshold", Some("fuzzy"), None),
        ];
        let stats = vec![CandidateStat {
            candidate_name: "HAWLEY, JOSHUA DAVID SEN".to_string(),
            candidate_id: None,
            party: None,
            state: None,
            email_count: 1,
        }];
        App::new(emails, stats, 4)
    }

    #[test]
    fn test_filters() {
        let mut app = app();

        app.apply_filter(FilterType::Matched);
        assert_eq!(app.filtered_emails.len(), 2);

        app.apply_filter(FilterType::Unmatched);
        assert_eq!(app.filtered_emails.len(), 2);

        app.apply_filter(FilterType::Override);
        assert_eq!(app.filtered_emails.len(), 1);
        assert_eq!(app.selected_email().unwrap().sender, "a");

        app.clear_filter();
        assert_eq!(app.filtered_emails.len(), 4);
    }

    #[test]
    fn test_stats() {
        let stats = app().stats();
        assert_eq!(
            stats,
            EmailStats {
                matched_count: 2,
                override_count: 1,
                unmatched_count: 2
            }
        );
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();
        app.previous();
        assert_eq!(app.state.selected(), Some(3));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.state.selected(), Some(3));
        app.page_up();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_drill_into_candidate() {
        let mut app = app();
        app.current_page = Page::Candidates;
        app.drill_into_candidate();

        assert_eq!(app.current_page, Page::Emails);
        assert_eq!(app.filtered_emails.len(), 1);
        assert_eq!(app.filtered_emails[0].sender, "b");
        assert_eq!(app.state.selected(), Some(0));

        // The status bar names the candidate, not a generic matched filter
        assert_eq!(
            app.active_filter,
            FilterType::Candidate("HAWLEY, JOSHUA DAVID SEN".to_string())
        );
        assert_eq!(app.active_filter.label(), "HAWLEY, JOSHUA DAVID SEN");

        app.clear_filter();
        assert_eq!(app.active_filter, FilterType::All);
        assert_eq!(app.filtered_emails.len(), 4);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ñññññññññññ", 6), "ñññ...");
    }
}
