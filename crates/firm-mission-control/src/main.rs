mod app;
mod config;
mod edits;
mod pulse;
mod ui;

use crate::app::{App, Mode, COMMAND_QUEUE_CAPACITY};
use crate::config::{init_logging, load_config};
use crate::pulse::{pulse_loop, Trigger};
use crate::ui::render_ui;
use anyhow::Context;
use chrono::Utc;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use firm_client::BackendClient;
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, sync::Arc};
use tokio::sync::mpsc;
use tracing::info;

const PULSE_EVENT_CAPACITY: usize = 64;

type Term = Terminal<CrosstermBackend<io::Stdout>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config();
    let log_guard = init_logging(&config);

    let client = BackendClient::new(&config.backend_url, config.request_timeout)
        .with_context(|| format!("cannot use backend url {:?}", config.backend_url))?;
    info!(
        event = "mission_control_start",
        backend = %client.base_url(),
        poll_ms = config.poll_interval.as_millis() as u64,
        timeout_ms = client.timeout().as_millis() as u64,
        log_file = log_guard.path_hint().unwrap_or("none")
    );

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let (pulse_tx, pulse_rx) = mpsc::channel(PULSE_EVENT_CAPACITY);
    tokio::spawn(pulse_loop(
        Arc::new(client),
        config.poll_interval,
        cmd_rx,
        pulse_tx,
    ));
    let mut app = App::new(config, cmd_tx);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run(&mut terminal, &mut app, pulse_rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    info!(event = "mission_control_stop");
    result
}

async fn run(
    terminal: &mut Term,
    app: &mut App,
    mut pulse_rx: mpsc::Receiver<pulse::PulseEvent>,
) -> anyhow::Result<()> {
    let mut events = EventStream::new();
    loop {
        terminal.draw(|frame| render_ui(frame, app))?;
        tokio::select! {
            Some(event) = pulse_rx.recv() => {
                app.apply_pulse_event(event, Utc::now());
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(event)) => {
                        if handle_input(event, app) {
                            break;
                        }
                    }
                    Some(Err(err)) => return Err(err).context("terminal input"),
                    None => break,
                }
            }
        }
    }
    Ok(())
}

fn handle_input(event: Event, app: &mut App) -> bool {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(key, app),
        _ => false,
    }
}

fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    if app.editor.is_some() {
        handle_editor_key(key, app);
        return false;
    }
    if app.picker.is_some() {
        handle_picker_key(key, app);
        return false;
    }
    if matches!(key.code, KeyCode::Char('?') | KeyCode::F(1)) {
        app.help_open = !app.help_open;
        return false;
    }
    if key.code == KeyCode::Esc && app.help_open {
        app.help_open = false;
        return false;
    }
    if app.help_open {
        return false;
    }
    if app.pending_delete.is_some() {
        match key.code {
            KeyCode::Char('y') => app.confirm_delete(),
            _ => app.cancel_delete(),
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') => true,
        KeyCode::Char('1') => {
            app.set_mode(Mode::Map);
            false
        }
        KeyCode::Char('2') => {
            app.set_mode(Mode::Agents);
            false
        }
        KeyCode::Char('3') => {
            app.set_mode(Mode::Rooms);
            false
        }
        KeyCode::Char('4') => {
            app.set_mode(Mode::Timeline);
            false
        }
        KeyCode::Char('5') => {
            app.set_mode(Mode::Ledger);
            false
        }
        KeyCode::Tab => {
            app.set_mode(app.mode.next());
            false
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if scrolls(app.mode) {
                app.scroll = app.scroll.saturating_add(1);
            } else {
                app.move_selection(1);
            }
            false
        }
        KeyCode::Up | KeyCode::Char('k') => {
            if scrolls(app.mode) {
                app.scroll = app.scroll.saturating_sub(1);
            } else {
                app.move_selection(-1);
            }
            false
        }
        KeyCode::Char('g') => {
            app.selected = 0;
            app.scroll = 0;
            false
        }
        KeyCode::Char('n') => {
            app.trigger(Trigger::Advance);
            false
        }
        KeyCode::Char('r') => {
            app.trigger(Trigger::Resync);
            false
        }
        KeyCode::Char('m') => {
            app.open_move_picker();
            false
        }
        KeyCode::Char('e') | KeyCode::Enter => {
            if !scrolls(app.mode) {
                app.edit_selected();
            }
            false
        }
        KeyCode::Char('a') => {
            app.create_new();
            false
        }
        KeyCode::Char('x') => {
            if !scrolls(app.mode) {
                app.request_delete();
            }
            false
        }
        _ => false,
    }
}

fn handle_editor_key(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Esc => app.cancel_editor(),
        KeyCode::Enter => app.save_editor(),
        KeyCode::Tab | KeyCode::Down => app.editor_step(1),
        KeyCode::BackTab | KeyCode::Up => app.editor_step(-1),
        KeyCode::Backspace => app.editor_backspace(),
        KeyCode::Char(ch) => app.editor_input(ch),
        _ => {}
    }
}

fn handle_picker_key(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.picker = None,
        KeyCode::Down | KeyCode::Char('j') => app.move_picker_choice(1),
        KeyCode::Up | KeyCode::Char('k') => app.move_picker_choice(-1),
        KeyCode::Enter => app.commit_move_picker(Utc::now()),
        _ => {}
    }
}

fn scrolls(mode: Mode) -> bool {
    matches!(mode, Mode::Timeline | Mode::Ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::edits::EditRequest;
    use crate::pulse::{PassOutcome, PassReport, PulseCommand};
    use crossterm::event::KeyModifiers;
    use firm_core::{AgentState, RoomState};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_app() -> (App, mpsc::Receiver<PulseCommand>) {
        let (tx, rx) = mpsc::channel(8);
        let mut app = App::new(Config::default(), tx);
        app.apply_pass(
            PassOutcome::Reconciled(PassReport {
                trigger: Trigger::Periodic,
                agents: Some(vec![AgentState {
                    name: "Alice".to_string(),
                    current_room: Some("Lab".to_string()),
                    ..AgentState::default()
                }]),
                rooms: Some(vec![
                    RoomState {
                        name: "Lab".to_string(),
                        ..RoomState::default()
                    },
                    RoomState {
                        name: "Office".to_string(),
                        ..RoomState::default()
                    },
                ]),
                events: Some(Vec::new()),
                balance: None,
                ideas: None,
                timeline: Vec::new(),
                failures: Vec::new(),
                generation: 1,
            }),
            Utc::now(),
        );
        (app, rx)
    }

    #[test]
    fn q_quits_and_tab_cycles_modes() {
        let (mut app, _rx) = test_app();
        assert!(!handle_key(key(KeyCode::Tab), &mut app));
        assert_eq!(app.mode, Mode::Agents);
        assert!(handle_key(key(KeyCode::Char('q')), &mut app));
    }

    #[test]
    fn n_and_r_send_triggers() {
        let (mut app, mut rx) = test_app();
        handle_key(key(KeyCode::Char('n')), &mut app);
        handle_key(key(KeyCode::Char('r')), &mut app);
        assert!(matches!(
            rx.try_recv(),
            Ok(PulseCommand::Trigger(Trigger::Advance))
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(PulseCommand::Trigger(Trigger::Resync))
        ));
    }

    #[test]
    fn typing_in_editor_does_not_trigger_shortcuts() {
        let (mut app, mut rx) = test_app();
        handle_key(key(KeyCode::Char('e')), &mut app);
        assert!(app.editor.is_some());
        assert!(!handle_key(key(KeyCode::Char('q')), &mut app));
        handle_key(key(KeyCode::Char('n')), &mut app);
        assert!(rx.try_recv().is_err());
        handle_key(key(KeyCode::Enter), &mut app);
        assert!(app.editor.is_none());
        assert!(matches!(
            rx.try_recv(),
            Ok(PulseCommand::Edit(EditRequest::SaveAgent { .. }))
        ));
    }

    #[test]
    fn move_picker_flow_moves_agent() {
        let (mut app, mut rx) = test_app();
        handle_key(key(KeyCode::Char('m')), &mut app);
        handle_key(key(KeyCode::Char('j')), &mut app);
        handle_key(key(KeyCode::Enter), &mut app);
        assert_eq!(app.agents[0].current_room.as_deref(), Some("Office"));
        assert!(matches!(
            rx.try_recv(),
            Ok(PulseCommand::Edit(EditRequest::MoveAgent { .. }))
        ));
    }

    #[test]
    fn delete_needs_confirmation() {
        let (mut app, mut rx) = test_app();
        handle_key(key(KeyCode::Char('x')), &mut app);
        handle_key(key(KeyCode::Char('n')), &mut app);
        assert_eq!(app.agents.len(), 1);
        assert!(rx.try_recv().is_err());

        handle_key(key(KeyCode::Char('x')), &mut app);
        handle_key(key(KeyCode::Char('y')), &mut app);
        assert!(app.agents.is_empty());
        assert!(matches!(
            rx.try_recv(),
            Ok(PulseCommand::Edit(EditRequest::DeleteAgent { .. }))
        ));
    }
}
