use crate::app::{App, Mode};
use firm_core::{occupants, unplaced, EntryOrigin, TimelineEntry};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

const COMPACT_WIDTH: u16 = 92;
const BALANCE_POINTS: usize = 12;

#[derive(Clone, Copy)]
pub struct PulseTheme {
    bg: Color,
    surface: Color,
    border: Color,
    title: Color,
    text: Color,
    muted: Color,
    accent: Color,
    ok: Color,
    warn: Color,
    critical: Color,
    info: Color,
}

pub fn pulse_theme() -> PulseTheme {
    PulseTheme {
        bg: Color::Rgb(11, 18, 32),
        surface: Color::Rgb(17, 26, 46),
        border: Color::Rgb(71, 85, 105),
        title: Color::Rgb(191, 219, 254),
        text: Color::Rgb(226, 232, 240),
        muted: Color::Rgb(148, 163, 184),
        accent: Color::Rgb(56, 189, 248),
        ok: Color::Rgb(34, 197, 94),
        warn: Color::Rgb(245, 158, 11),
        critical: Color::Rgb(239, 68, 68),
        info: Color::Rgb(59, 130, 246),
    }
}

fn panel(title: String, theme: PulseTheme, bg: Color) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(bg))
        .title(Span::styled(
            title,
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        ))
}

pub fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    let size = frame.size();
    let theme = pulse_theme();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(size);
    frame.render_widget(render_header(app, theme, size.width), layout[0]);
    frame.render_widget(render_kpis(app, theme, size.width), layout[1]);
    match app.mode {
        Mode::Agents | Mode::Rooms => render_list_panel(frame, app, theme, layout[2]),
        Mode::Map | Mode::Timeline | Mode::Ledger => {
            frame.render_widget(render_body(app, theme, size.width), layout[2])
        }
    }
    if app.picker.is_some() {
        render_move_picker(frame, app, theme);
    }
    if app.editor.is_some() {
        render_editor(frame, app, theme);
    }
    if app.help_open {
        render_help_overlay(frame, app, theme);
    }
}

fn render_header(app: &App, theme: PulseTheme, width: u16) -> Paragraph<'static> {
    let compact = is_compact(width);
    let inner_width = width.saturating_sub(4) as usize;
    let sync = match app.syncing {
        Some(trigger) => format!("syncing ({})", trigger.as_str()),
        None => "idle".to_string(),
    };
    let backend = ellipsize(&app.config.backend_url, if compact { 18 } else { 36 });
    let status_fields = vec![
        format!("Mode: {}", app.mode.title()),
        format!("Pulse: {sync}"),
        format!("Backend: {backend}"),
        format!("Generation: {}", app.generation),
    ];
    let status_line = fit_fields(&status_fields, inner_width.max(12));

    let action_text = if let Some(note) = app.status_note.as_deref() {
        format!("Last Action: {note}")
    } else if compact {
        "Last Action: ready".to_string()
    } else {
        "Last Action: ready (n advance, r resync, m move, ? help)".to_string()
    };
    let action_color = match app.status_note.as_deref() {
        Some(note) => status_note_color(note, app.note_is_error(), theme),
        None => theme.muted,
    };

    Paragraph::new(Text::from(vec![
        Line::from(Span::styled(status_line, Style::default().fg(theme.text))),
        Line::from(Span::styled(
            ellipsize(&action_text, inner_width.max(12)),
            Style::default().fg(action_color),
        )),
    ]))
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(panel("Status".to_string(), theme, theme.bg))
}

fn render_kpis(app: &App, theme: PulseTheme, width: u16) -> Paragraph<'static> {
    let compact = is_compact(width);
    let inner_width = width.saturating_sub(4) as usize;
    let balance = match &app.balance {
        Some(balance) => match balance.delta() {
            Some(delta) => format!("Balance: {:.2} ({delta:+.2})", balance.current),
            None => format!("Balance: {:.2}", balance.current),
        },
        None => "Balance: --".to_string(),
    };
    let mut fields = vec![
        balance,
        format!("Agents: {}", app.agents.len()),
        format!("Rooms: {}", app.rooms.len()),
        format!(
            "Timeline: {}/{}",
            app.timeline.len(),
            app.timeline.capacity()
        ),
    ];
    if !compact {
        fields.push(format!("Drafts: {}", app.drafts.len()));
        fields.push(format!(
            "Last Pass: {}",
            app.last_pass_at
                .map(|at| at.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string())
        ));
    }
    let line = fit_fields(&fields, inner_width.max(12));

    Paragraph::new(Line::from(Span::styled(
        line,
        Style::default().fg(theme.text),
    )))
    .style(Style::default().fg(theme.text).bg(theme.surface))
    .block(panel("Pulse".to_string(), theme, theme.surface))
}

fn render_body(app: &App, theme: PulseTheme, width: u16) -> Paragraph<'static> {
    let compact = is_compact(width);
    let lines = match app.mode {
        Mode::Map => render_map_lines(app, theme),
        Mode::Timeline => render_timeline_lines(app, theme, compact),
        Mode::Ledger => render_ledger_lines(app, theme),
        Mode::Agents | Mode::Rooms => Vec::new(),
    };
    Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel(app.mode.title().to_string(), theme, theme.surface))
        .scroll((app.scroll, 0))
}

fn render_list_panel(frame: &mut ratatui::Frame, app: &App, theme: PulseTheme, area: Rect) {
    let compact = is_compact(area.width);
    let items: Vec<ListItem> = if app.mode.selects_rooms() {
        app.rooms
            .iter()
            .map(|room| {
                let here = occupants(&room.name, &app.agents).len();
                let mut spans = vec![
                    Span::styled(
                        ellipsize(&room.name, 18),
                        Style::default()
                            .fg(theme.accent)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!("  {here} here"), Style::default().fg(theme.muted)),
                ];
                if !compact {
                    spans.push(Span::raw(format!("  {}", ellipsize(&room.description, 40))));
                    if !room.inventory.is_empty() {
                        spans.push(Span::styled(
                            format!("  [{}]", ellipsize(&room.inventory.join(", "), 30)),
                            Style::default().fg(theme.muted),
                        ));
                    }
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    } else {
        app.agents
            .iter()
            .map(|agent| {
                let mut spans = vec![
                    Span::styled(
                        format!("{:<14}", ellipsize(&agent.name, 14)),
                        Style::default()
                            .fg(theme.text)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" {:<12}", ellipsize(agent.room_label(), 12)),
                        Style::default().fg(theme.accent),
                    ),
                    Span::styled(
                        format!(" {}", mood_chip(agent.emotional_state)),
                        Style::default().fg(mood_color(agent.emotional_state, theme)),
                    ),
                    Span::raw(format!(
                        " {}",
                        ellipsize(agent.last_action().unwrap_or("-"), if compact { 20 } else { 36 })
                    )),
                ];
                if !compact {
                    spans.push(Span::styled(
                        format!("  {} / {}", agent.role, agent.model),
                        Style::default().fg(theme.muted),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    if items.is_empty() {
        let empty = if app.mode.selects_rooms() {
            "No rooms reported yet."
        } else {
            "No agents reported yet."
        };
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                empty,
                Style::default().fg(theme.muted),
            )))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(panel(app.mode.title().to_string(), theme, theme.surface)),
            area,
        );
        return;
    }

    let mut state = ListState::default();
    state.select(Some(app.selected));
    let list = List::new(items)
        .highlight_symbol(">> ")
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .block(panel(app.mode.title().to_string(), theme, theme.surface));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_map_lines(app: &App, theme: PulseTheme) -> Vec<Line<'static>> {
    if app.rooms.is_empty() && app.agents.is_empty() {
        return vec![Line::from(Span::styled(
            "Waiting for the first snapshot.",
            Style::default().fg(theme.muted),
        ))];
    }
    let selected = app.selected_agent().map(|agent| agent.name.clone());
    let agent_span = |name: &str| {
        if selected.as_deref() == Some(name) {
            Span::styled(
                format!("[{name}]"),
                Style::default()
                    .fg(theme.bg)
                    .bg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(name.to_string(), Style::default().fg(theme.text))
        }
    };

    let mut lines = Vec::new();
    for room in &app.rooms {
        let here = occupants(&room.name, &app.agents);
        let mut spans = vec![Span::styled(
            format!("{:<16}", ellipsize(&room.name, 16)),
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )];
        if here.is_empty() {
            spans.push(Span::styled("empty", Style::default().fg(theme.muted)));
        }
        for (index, agent) in here.iter().enumerate() {
            if index > 0 {
                spans.push(Span::raw("  "));
            }
            spans.push(agent_span(&agent.name));
        }
        lines.push(Line::from(spans));
    }
    let stray = unplaced(&app.agents, &app.rooms);
    if !stray.is_empty() {
        lines.push(Line::from(""));
        let mut spans = vec![Span::styled(
            format!("{:<16}", "Unplaced"),
            Style::default().fg(theme.warn).add_modifier(Modifier::BOLD),
        )];
        for (index, agent) in stray.iter().enumerate() {
            if index > 0 {
                spans.push(Span::raw("  "));
            }
            spans.push(agent_span(&agent.name));
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn render_timeline_lines(app: &App, theme: PulseTheme, compact: bool) -> Vec<Line<'static>> {
    if app.timeline.is_empty() {
        return vec![Line::from(Span::styled(
            "No changes observed yet.",
            Style::default().fg(theme.muted),
        ))];
    }
    app.timeline
        .iter()
        .map(|entry| timeline_line(entry, theme, compact))
        .collect()
}

fn timeline_line(entry: &TimelineEntry, theme: PulseTheme, compact: bool) -> Line<'static> {
    let mut spans = vec![Span::styled(
        format!("{:<7}", entry.origin().as_str()),
        Style::default().fg(origin_color(entry.origin(), theme)),
    )];
    if entry.is_system() {
        spans.push(Span::styled("system ", Style::default().fg(theme.muted)));
    } else {
        spans.push(Span::styled(
            format!("{} ", entry.actor()),
            Style::default()
                .fg(theme.text)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if !entry.room().is_empty() {
        spans.push(Span::styled(
            format!("@{} ", entry.room()),
            Style::default().fg(theme.accent),
        ));
    }
    spans.push(Span::raw(entry.action().to_string()));
    if let Some(reason) = entry.reason() {
        if !compact {
            spans.push(Span::styled(
                format!("  ({reason})"),
                Style::default().fg(theme.muted),
            ));
        }
    }
    Line::from(spans)
}

fn render_ledger_lines(app: &App, theme: PulseTheme) -> Vec<Line<'static>> {
    let heading = |text: &str| {
        Line::from(Span::styled(
            text.to_string(),
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ))
    };
    let mut lines = vec![heading("Balance")];
    match &app.balance {
        Some(balance) => {
            lines.push(Line::from(format!("  current {:.2}", balance.current)));
            let skip = balance.history.len().saturating_sub(BALANCE_POINTS);
            let points: Vec<String> = balance.history[skip..]
                .iter()
                .map(|value| format!("{value:.2}"))
                .collect();
            lines.push(Line::from(Span::styled(
                format!("  history {}", points.join(" → ")),
                Style::default().fg(theme.muted),
            )));
        }
        None => lines.push(Line::from(Span::styled(
            "  balance unavailable",
            Style::default().fg(theme.muted),
        ))),
    }

    lines.push(Line::from(""));
    lines.push(heading("Ideas (last advanced cycle)"));
    if app.ideas.is_empty() {
        lines.push(Line::from(Span::styled(
            "  none yet; press n to advance a cycle",
            Style::default().fg(theme.muted),
        )));
    }
    for idea in &app.ideas {
        let (chip, color) = match (idea.validated, idea.executed) {
            (_, true) => ("done", theme.ok),
            (true, false) => ("ok", theme.info),
            (false, false) => ("new", theme.muted),
        };
        let mut spans = vec![
            Span::styled(format!("  {chip:<4} "), Style::default().fg(color)),
            Span::raw(idea.description.clone()),
        ];
        if !idea.author.is_empty() {
            spans.push(Span::styled(
                format!("  by {}", idea.author),
                Style::default().fg(theme.muted),
            ));
        }
        if let Some(outcome) = &idea.outcome {
            spans.push(Span::styled(
                format!("  => {outcome}"),
                Style::default().fg(theme.warn),
            ));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(""));
    lines.push(heading("Backend events"));
    if app.events.is_empty() {
        lines.push(Line::from(Span::styled(
            "  no events",
            Style::default().fg(theme.muted),
        )));
    }
    for event in app.events.iter().rev() {
        lines.push(Line::from(format!("  {event}")));
    }
    lines
}

fn render_move_picker(frame: &mut ratatui::Frame, app: &App, theme: PulseTheme) {
    let Some(picker) = app.picker.as_ref() else {
        return;
    };
    let area = centered_rect(40, 50, frame.size());
    let items: Vec<ListItem> = app
        .rooms
        .iter()
        .map(|room| ListItem::new(Line::from(room.name.clone())))
        .collect();
    let mut state = ListState::default();
    state.select(Some(picker.choice));
    let list = List::new(items)
        .highlight_symbol(">> ")
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel(format!("Move {}", picker.agent), theme, theme.surface));
    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_editor(frame: &mut ratatui::Frame, app: &App, theme: PulseTheme) {
    let Some((editor, draft)) = app.editor_draft() else {
        return;
    };
    let area = centered_rect(64, 50, frame.size());
    let mut lines = Vec::new();
    for (index, label) in draft.labels().iter().enumerate() {
        let locked = index == 0 && !editor.key.is_new();
        let active = index == editor.field;
        let value = if active {
            format!("{}_", draft.value(index))
        } else {
            draft.value(index).to_string()
        };
        let label_style = if active {
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.muted)
        };
        let value_style = if locked {
            Style::default().fg(theme.muted)
        } else {
            Style::default().fg(theme.text)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{label:>12}: "), label_style),
            Span::styled(value, value_style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab/Up/Down field  Enter save  Esc cancel",
        Style::default().fg(theme.muted),
    )));
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(panel(
                format!("Edit {}", editor.key.label()),
                theme,
                theme.surface,
            ))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn render_help_overlay(frame: &mut ratatui::Frame, app: &App, theme: PulseTheme) {
    let area = centered_rect(78, 72, frame.size());
    let section = |text: &'static str| {
        Line::from(Span::styled(
            text,
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ))
    };
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                "Controls",
                Style::default()
                    .fg(theme.title)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                format!("mode:{}", app.mode.title().to_ascii_lowercase()),
                Style::default().fg(theme.muted),
            ),
        ]),
        section("Navigation"),
        Line::from("  1-5      switch mode (Map/Agents/Rooms/Timeline/Ledger)"),
        Line::from("  Tab      cycle mode"),
        Line::from("  j/k      select agent or room, scroll elsewhere"),
        Line::from(""),
        section("Simulation"),
        Line::from("  n        advance one cycle"),
        Line::from("  r        resync everything now"),
        Line::from(""),
        section("Edits"),
        Line::from("  m        move selected agent to another room"),
        Line::from("  e        edit selected agent or room"),
        Line::from("  a        add agent (room in Rooms mode)"),
        Line::from("  x        delete selected, y to confirm"),
        Line::from(""),
        section("Exit"),
        Line::from("  ? or F1  toggle this help"),
        Line::from("  Esc      close help"),
        Line::from("  q        quit"),
    ];
    if !app.drafts.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {} unsaved draft(s) open", app.drafts.len()),
            Style::default().fg(theme.warn),
        )));
    }
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(panel("Help".to_string(), theme, theme.surface))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
        ])
        .split(vertical[1])[1]
}

fn status_note_color(note: &str, is_error: bool, theme: PulseTheme) -> Color {
    if is_error {
        return theme.critical;
    }
    let normalized = note.to_ascii_lowercase();
    if normalized.contains("saved") || normalized.contains("advanced") {
        return theme.ok;
    }
    if normalized.contains("queued") {
        return theme.info;
    }
    theme.warn
}

fn origin_color(origin: EntryOrigin, theme: PulseTheme) -> Color {
    match origin {
        EntryOrigin::Cycle => theme.info,
        EntryOrigin::Event => theme.muted,
        EntryOrigin::Manual => theme.warn,
    }
}

fn mood_chip(value: i64) -> &'static str {
    match value {
        v if v > 0 => "+",
        0 => "=",
        _ => "-",
    }
}

fn mood_color(value: i64, theme: PulseTheme) -> Color {
    match value {
        v if v > 0 => theme.ok,
        0 => theme.muted,
        _ => theme.critical,
    }
}

pub(crate) fn ellipsize(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    if max <= 3 {
        return "...".chars().take(max).collect();
    }
    let prefix: String = input.chars().take(max - 3).collect();
    format!("{prefix}...")
}

fn fit_fields(fields: &[String], max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let mut output = String::new();
    for field in fields {
        if field.trim().is_empty() {
            continue;
        }
        let candidate = if output.is_empty() {
            field.clone()
        } else {
            format!("{output} | {field}")
        };
        if candidate.chars().count() <= max {
            output = candidate;
            continue;
        }
        if output.is_empty() {
            return ellipsize(field, max);
        }
        break;
    }
    output
}

fn is_compact(width: u16) -> bool {
    width < COMPACT_WIDTH
}
