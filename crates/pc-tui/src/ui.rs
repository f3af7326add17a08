use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};

use pc_node::NodeState;

use crate::{
    app::{App, Connection},
    commands::View,
    posts::readable_time,
};

// ── Green-based colour palette ────────────────────────────────────────────────
const PRIMARY: Color = Color::Green;
const BRIGHT: Color = Color::LightGreen;
const DIM: Color = Color::DarkGray;
const WARN: Color = Color::Yellow;
const DANGER: Color = Color::Red;
const MUTED: Color = Color::Gray;

pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // ── Three-row outer layout ────────────────────────────────────────────────
    //   Row 0: header  (1 line)
    //   Row 1: content (fills remaining space)
    //   Row 2: input   (3 lines: hint + feedback + prompt)
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    draw_header(frame, app, rows[0]);
    draw_content_panel(frame, app, rows[1]);
    draw_input_area(frame, app, rows[2]);
}

// ── Header (row 0) ────────────────────────────────────────────────────────────

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            "postchain explorer",
            Style::default().fg(BRIGHT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(app.node.clone(), Style::default().fg(MUTED)),
        Span::raw("  "),
        Span::styled(
            format!("[{}]", app.connection.label()),
            Style::default().fg(connection_color(&app.connection)),
        ),
    ];
    if let Some(status) = &app.status {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("[{}]", status.state.label()),
            Style::default().fg(state_color(status.state)),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ── Content panel (row 1) ─────────────────────────────────────────────────────

fn draw_content_panel(frame: &mut Frame, app: &App, area: Rect) {
    let inner = area.inner(Margin { horizontal: 1, vertical: 0 });

    match app.view {
        View::Posts => draw_posts(frame, app, inner),
        View::Status => draw_status(frame, app, inner),
        View::Pending => draw_pending(frame, app, inner),
        View::Peers => draw_peers(frame, app, inner),
        View::Traffic => draw_traffic(frame, app, inner),
    }
}

/// Title line above a scrolling list.
fn split_titled(area: Rect) -> (Rect, Rect) {
    let split = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(area);
    (split[0], split[1])
}

fn draw_title(frame: &mut Frame, title: String, area: Rect) {
    frame.render_widget(
        Paragraph::new(Span::styled(title, Style::default().fg(DIM))),
        area,
    );
}

/// Render `items` with the row at `scroll` at the top, plus a scrollbar.
fn draw_scrolling(frame: &mut Frame, items: Vec<ListItem>, scroll: usize, area: Rect) {
    let total = items.len();
    let mut list_state = ListState::default();
    if total > 0 {
        *list_state.offset_mut() = scroll.min(total - 1);
    }
    frame.render_stateful_widget(List::new(items), area, &mut list_state);

    if total > 0 {
        let mut sb_state = ScrollbarState::new(total).position(scroll);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut sb_state,
        );
    }
}

fn empty_list(text: &str) -> Vec<ListItem<'static>> {
    vec![ListItem::new(Span::styled(
        format!("  {text}"),
        Style::default().fg(DIM),
    ))]
}

// ── Posts view ────────────────────────────────────────────────────────────────

fn draw_posts(frame: &mut Frame, app: &App, area: Rect) {
    let (title, body) = split_titled(area);
    let validity = if app.chain_valid { "" } else { "  · chain INVALID" };
    draw_title(frame, format!("posts  ({}){validity}", app.posts.len()), title);

    if app.posts.is_empty() {
        frame.render_widget(List::new(empty_list("no posts on chain yet")), body);
        return;
    }

    let now = Utc::now();
    let items: Vec<ListItem> = app
        .posts
        .iter()
        .map(|post| {
            let heading = Line::from(vec![
                Span::styled(
                    post.author.clone(),
                    Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  {}", readable_time(post.timestamp, now)),
                    Style::default().fg(MUTED),
                ),
                Span::styled(
                    format!("  block #{} · prev {}", post.index, truncate(&post.previous_hash, 12)),
                    Style::default().fg(DIM),
                ),
            ]);
            let content = Line::from(Span::styled(
                format!("  {}", post.content),
                Style::default().fg(BRIGHT),
            ));
            ListItem::new(vec![heading, content, Line::raw("")])
        })
        .collect();

    draw_scrolling(frame, items, app.scroll, body);
}

// ── Status view ───────────────────────────────────────────────────────────────

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let Some(s) = &app.status else {
        frame.render_widget(List::new(empty_list("waiting for the node…")), area);
        return;
    };

    let length_str = s.length.to_string();
    let pending_str = s.pending.to_string();
    let peers_str = s.peers.to_string();
    let difficulty_str = s.difficulty.to_string();
    let tip_str = truncate(&s.tip, 48);
    let valid_str = if app.chain_valid { "yes" } else { "no" };

    let rows: Vec<Line> = vec![
        kv_row("node", &app.node, MUTED),
        kv_row("connection", app.connection.label(), connection_color(&app.connection)),
        kv_row("node state", s.state.label(), state_color(s.state)),
        kv_row("chain length", &length_str, BRIGHT),
        kv_row("chain valid", valid_str, if app.chain_valid { PRIMARY } else { DANGER }),
        kv_row("tip", &tip_str, MUTED),
        kv_row("difficulty", &difficulty_str, PRIMARY),
        kv_row("pending posts", &pending_str, BRIGHT),
        kv_row("peers", &peers_str, BRIGHT),
    ];

    let items: Vec<ListItem> = rows.into_iter().map(ListItem::new).collect();
    frame.render_widget(List::new(items), area);
}

// ── Pending view ──────────────────────────────────────────────────────────────

fn draw_pending(frame: &mut Frame, app: &App, area: Rect) {
    let (title, body) = split_titled(area);
    draw_title(frame, format!("pending  ({} posts, /mine to seal)", app.pending.len()), title);

    let items = if app.pending.is_empty() {
        empty_list("pool is empty")
    } else {
        let now = Utc::now();
        app.pending
            .iter()
            .map(|tx| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("  {:<16}", truncate(&tx.author, 16)), Style::default().fg(PRIMARY)),
                    Span::styled(tx.content.clone(), Style::default().fg(BRIGHT)),
                    Span::styled(
                        format!("  {}", readable_time(tx.timestamp, now)),
                        Style::default().fg(DIM),
                    ),
                ]))
            })
            .collect()
    };
    draw_scrolling(frame, items, app.scroll, body);
}

// ── Peers view ────────────────────────────────────────────────────────────────

fn draw_peers(frame: &mut Frame, app: &App, area: Rect) {
    let (title, body) = split_titled(area);
    draw_title(frame, format!("peers  ({} registered)", app.peers.len()), title);

    let items = if app.peers.is_empty() {
        empty_list("none")
    } else {
        app.peers
            .iter()
            .map(|peer| {
                ListItem::new(Span::styled(
                    format!("  {}", truncate(peer, 60)),
                    Style::default().fg(PRIMARY),
                ))
            })
            .collect()
    };
    draw_scrolling(frame, items, app.scroll, body);
}

// ── Traffic view ──────────────────────────────────────────────────────────────

fn draw_traffic(frame: &mut Frame, app: &App, area: Rect) {
    let (title, body) = split_titled(area);
    draw_title(frame, format!("traffic  ({} events)", app.traffic.len()), title);

    let items: Vec<ListItem> = app
        .traffic
        .iter()
        .map(|entry| {
            let ts = Span::styled(
                format!("{} ", entry.timestamp),
                Style::default().fg(DIM),
            );
            let msg = Span::styled(entry.message.clone(), traffic_style(&entry.message));
            ListItem::new(Line::from(vec![ts, msg]))
        })
        .collect();

    // Keep the newest entry in sight while following the log.
    let visible = body.height as usize;
    let top = (app.scroll + 1).saturating_sub(visible);
    draw_scrolling(frame, items, top, body);
}

// ── Input area (row 2) ────────────────────────────────────────────────────────
//
//   Line 0: key hints (dim)
//   Line 1: feedback / error message
//   Line 2: > prompt

fn draw_input_area(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // hints
            Constraint::Length(1), // feedback
            Constraint::Length(1), // prompt
        ])
        .split(area);

    frame.render_widget(
        Paragraph::new(Span::styled(
            "↑/↓ history · PgUp/PgDn scroll · Tab view · /help for commands · Ctrl-C quit",
            Style::default().fg(DIM),
        )),
        rows[0],
    );

    let feedback_text = app.command_output.as_deref().unwrap_or("");
    let feedback_style = if feedback_text.starts_with("error") {
        Style::default().fg(DANGER)
    } else if !feedback_text.is_empty() {
        Style::default().fg(WARN)
    } else {
        Style::default().fg(DIM)
    };
    frame.render_widget(
        Paragraph::new(Span::styled(feedback_text.to_string(), feedback_style)),
        rows[1],
    );

    let prompt = Line::from(vec![
        Span::styled("> ", Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)),
        Span::styled(format!("{}_", app.input), Style::default().fg(BRIGHT)),
    ]);
    frame.render_widget(Paragraph::new(prompt), rows[2]);
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn kv_row<'a>(label: &'a str, value: &'a str, value_color: Color) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("  {:<18}", label), Style::default().fg(DIM)),
        Span::styled(value.to_owned(), Style::default().fg(value_color)),
    ])
}

fn connection_color(connection: &Connection) -> Color {
    match connection {
        Connection::Online => PRIMARY,
        Connection::Offline => DANGER,
        Connection::Connecting => WARN,
    }
}

fn state_color(state: NodeState) -> Color {
    match state {
        NodeState::Idle => PRIMARY,
        NodeState::Mining | NodeState::Syncing => WARN,
    }
}

fn traffic_style(msg: &str) -> Style {
    if msg.starts_with("error") {
        Style::default().fg(DANGER)
    } else if msg.contains("replaced") || msg.contains("Chain length") {
        Style::default().fg(BRIGHT)
    } else if msg.contains("Mined") || msg.contains("block") {
        Style::default().fg(Color::Cyan)
    } else if msg.contains("Posted") || msg.contains("Connected") || msg.contains("Registered") {
        Style::default().fg(PRIMARY)
    } else {
        Style::default().fg(MUTED)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
