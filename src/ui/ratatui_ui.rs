use crate::models::*;
use crate::services::scheduler::RefreshHandle;
use crate::services::usage_monitor::UsageSnapshotReceiver;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, Paragraph, Row, Table, Tabs, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, SystemTime};
use tokio::time::sleep;

const TAB_TITLES: [&str; 3] = ["Overview", "Models", "About"];

/// Full-screen dashboard following the published usage snapshot
pub struct RatatuiTerminalUI {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    warning_threshold: f64,
    selected_tab: usize,
}

impl RatatuiTerminalUI {
    pub fn new(config: &UserConfig) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            warning_threshold: config.warning_threshold,
            selected_tab: 0,
        })
    }

    /// Redraw from the latest snapshot until the user quits
    pub async fn run(&mut self, mut snapshots: UsageSnapshotReceiver, refresh: RefreshHandle) -> Result<()> {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            let selected_tab = self.selected_tab;
            let warning_threshold = self.warning_threshold;
            self.terminal.draw(|frame| {
                draw_dashboard(frame, &snapshot, selected_tab, warning_threshold);
            })?;

            if self.handle_input(&refresh)? {
                break;
            }

            sleep(Duration::from_millis(50)).await;
        }

        Ok(())
    }

    /// Returns true when the user asked to quit
    fn handle_input(&mut self, refresh: &RefreshHandle) -> Result<bool> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(KeyEvent { code, modifiers, .. }) = event::read()? {
                match code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
                    KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(true);
                    }
                    KeyCode::Tab => {
                        self.selected_tab = (self.selected_tab + 1) % TAB_TITLES.len();
                    }
                    KeyCode::BackTab => {
                        self.selected_tab =
                            (self.selected_tab + TAB_TITLES.len() - 1) % TAB_TITLES.len();
                    }
                    KeyCode::Char('r') => refresh.request_refresh(),
                    _ => {}
                }
            }
        }
        Ok(false)
    }

    pub fn cleanup(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for RatatuiTerminalUI {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Render one frame of the dashboard
pub fn draw_dashboard(frame: &mut Frame, snapshot: &UsageSnapshot, selected_tab: usize, warning_threshold: f64) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    draw_header(frame, chunks[0]);
    draw_tabs(frame, chunks[1], selected_tab);

    match selected_tab {
        0 => draw_overview_tab(frame, chunks[2], snapshot, warning_threshold),
        1 => draw_models_tab(frame, chunks[2], snapshot),
        _ => draw_about_tab(frame, chunks[2]),
    }

    draw_footer(frame, chunks[3]);
}

fn draw_header(frame: &mut Frame, area: Rect) {
    let header_text = format!(
        "Claude Usage Monitor v{} (Built: {})",
        env!("CARGO_PKG_VERSION"),
        env!("USAGE_MONITOR_BUILD_TIME")
    );

    let title = Paragraph::new(header_text)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        );
    frame.render_widget(title, area);
}

fn draw_tabs(frame: &mut Frame, area: Rect, selected_tab: usize) {
    let tabs = Tabs::new(TAB_TITLES.to_vec())
        .block(Block::default().borders(Borders::ALL).title("Navigation"))
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .select(selected_tab);
    frame.render_widget(tabs, area);
}

fn draw_overview_tab(frame: &mut Frame, area: Rect, snapshot: &UsageSnapshot, warning_threshold: f64) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Session info
            Constraint::Length(3), // Usage gauge
            Constraint::Min(6),    // Statistics
        ])
        .split(area);

    draw_session_info(frame, chunks[0], snapshot);
    draw_usage_gauge(frame, chunks[1], snapshot, warning_threshold);
    draw_statistics_table(frame, chunks[2], snapshot);
}

fn draw_session_info(frame: &mut Frame, area: Rect, snapshot: &UsageSnapshot) {
    let (status, status_color) = if snapshot.has_active_session {
        ("ACTIVE", Color::Green)
    } else {
        ("NO ACTIVE SESSION", Color::DarkGray)
    };

    let session_time = |time: Option<chrono::DateTime<chrono::Utc>>| {
        time.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| NO_SESSION_PLACEHOLDER.to_string())
    };

    let mut plan_spans = vec![
        Span::raw("Plan: "),
        Span::styled(
            format!("{} ({} tokens)", snapshot.plan_label, snapshot.token_limit),
            Style::default().fg(Color::Cyan),
        ),
    ];
    if snapshot.is_manual_plan && snapshot.detected_plan != snapshot.plan {
        plan_spans.push(Span::styled(
            format!("  detected: {}", snapshot.detected_plan),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let lines = vec![
        Line::from(plan_spans),
        Line::from(vec![
            Span::raw("Status: "),
            Span::styled(status, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(format!("Window start: {}", session_time(snapshot.session_start))),
        Line::from(format!("Window end:   {}", session_time(snapshot.session_end))),
    ];

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Session")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

fn draw_usage_gauge(frame: &mut Frame, area: Rect, snapshot: &UsageSnapshot, warning_threshold: f64) {
    let ratio = snapshot.usage_percent / 100.0;

    let gauge_color = if ratio >= 1.0 {
        Color::Red
    } else if ratio >= warning_threshold {
        Color::Yellow
    } else {
        Color::Green
    };

    // Usage can run past the limit; the bar stops at full
    let gauge = Gauge::default()
        .block(Block::default().title("Token Usage").borders(Borders::ALL))
        .gauge_style(Style::default().fg(gauge_color))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(format!(
            "{} / {} tokens ({:.1}%)",
            snapshot.current_tokens, snapshot.token_limit, snapshot.usage_percent
        ));

    frame.render_widget(gauge, area);
}

fn draw_statistics_table(frame: &mut Frame, area: Rect, snapshot: &UsageSnapshot) {
    let forecast = if snapshot.will_exceed_before_reset {
        Cell::from("Limit reached before reset").style(Style::default().fg(Color::Red))
    } else {
        Cell::from("Within budget until reset")
    };

    let last_refreshed = snapshot
        .last_refreshed
        .map(|t| humantime::format_rfc3339_seconds(SystemTime::from(t)).to_string())
        .unwrap_or_else(|| "never".to_string());

    let rows = vec![
        Row::new(vec![
            Cell::from("Burn Rate"),
            Cell::from(format!("{:.1} tokens/min", snapshot.burn_rate)),
        ]),
        Row::new(vec![
            Cell::from("Time Remaining"),
            Cell::from(snapshot.time_remaining.clone()),
        ]),
        Row::new(vec![Cell::from("Resets At"), Cell::from(snapshot.reset_time.clone())]),
        Row::new(vec![
            Cell::from("Tokens Left"),
            Cell::from(snapshot.remaining_tokens().to_string()),
        ]),
        Row::new(vec![
            Cell::from("Raw Tokens"),
            Cell::from(snapshot.raw_tokens.to_string()),
        ]),
        Row::new(vec![Cell::from("Forecast"), forecast]),
        Row::new(vec![Cell::from("Last Refresh"), Cell::from(last_refreshed)]),
    ];

    let table = Table::new(rows, [Constraint::Percentage(40), Constraint::Percentage(60)])
        .block(Block::default().title("Usage Statistics").borders(Borders::ALL))
        .header(
            Row::new(vec!["Metric", "Value"])
                .style(Style::default().add_modifier(Modifier::BOLD))
                .bottom_margin(1),
        )
        .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_models_tab(frame: &mut Frame, area: Rect, snapshot: &UsageSnapshot) {
    let block = Block::default()
        .title("Active Window by Model")
        .borders(Borders::ALL);

    if snapshot.model_breakdown.is_empty() {
        let empty = Paragraph::new("No usage in the active window")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let rows: Vec<Row> = snapshot
        .model_breakdown
        .iter()
        .map(|entry| {
            let weight_style = if entry.weighted_tokens == 0 {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::Yellow)
            };
            Row::new(vec![
                Cell::from(entry.model.clone()),
                Cell::from(entry.weighted_tokens.to_string()).style(weight_style),
                Cell::from(entry.raw_tokens.to_string()),
                Cell::from(entry.cache_creation_tokens.to_string()),
                Cell::from(entry.cache_read_tokens.to_string()),
                Cell::from(entry.entries_count.to_string()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(30),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
        ],
    )
    .block(block)
    .header(
        Row::new(vec!["Model", "Counted", "Raw", "Cache New", "Cache Read", "Entries"])
            .style(Style::default().add_modifier(Modifier::BOLD))
            .bottom_margin(1),
    )
    .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_about_tab(frame: &mut Frame, area: Rect) {
    let about_info = vec![
        format!("Claude Usage Monitor v{}", env!("CARGO_PKG_VERSION")),
        format!("Built: {}", env!("USAGE_MONITOR_BUILD_TIME")),
        format!("Build ID: {}", env!("USAGE_MONITOR_BUILD_ID")),
        format!("Git: {}", env!("USAGE_MONITOR_GIT_HASH")),
        String::new(),
        format!("Budget windows last {SESSION_DURATION_HOURS} hours, starting on the hour."),
        "Opus tokens count five times, Sonnet once, other models not at all.".to_string(),
        "Burn rate covers the last hour of activity across all windows.".to_string(),
        String::new(),
        "Data: Claude Code JSONL transcripts under ~/.claude/projects".to_string(),
    ];

    let items: Vec<ListItem> = about_info
        .iter()
        .map(|s| ListItem::new(Line::from(s.as_str())))
        .collect();

    let list = List::new(items)
        .block(Block::default().title("About").borders(Borders::ALL))
        .style(Style::default().fg(Color::White));

    frame.render_widget(list, area);
}

fn draw_footer(frame: &mut Frame, area: Rect) {
    let controls = Paragraph::new("Controls: [Q]uit | [Tab] Switch tabs | [R]efresh")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
    frame.render_widget(controls, area);
}
