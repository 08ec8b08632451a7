use crate::config::Config;
use crate::edits::{Draft, DraftBook, DraftKey, EditRequest};
use crate::pulse::{PassOutcome, PassReport, PulseCommand, PulseEvent, Trigger};
use chrono::{DateTime, Utc};
use firm_core::{
    AgentState, BalanceHistory, IdeaRecord, RoomState, TimelineBuffer, TimelineEvent,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const COMMAND_QUEUE_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Map,
    Agents,
    Rooms,
    Timeline,
    Ledger,
}

impl Mode {
    pub fn title(self) -> &'static str {
        match self {
            Mode::Map => "Map",
            Mode::Agents => "Agents",
            Mode::Rooms => "Rooms",
            Mode::Timeline => "Timeline",
            Mode::Ledger => "Ledger",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Mode::Map => Mode::Agents,
            Mode::Agents => Mode::Rooms,
            Mode::Rooms => Mode::Timeline,
            Mode::Timeline => Mode::Ledger,
            Mode::Ledger => Mode::Map,
        }
    }

    /// Modes whose selection walks the room list rather than agents.
    pub fn selects_rooms(self) -> bool {
        self == Mode::Rooms
    }
}

/// Where the current status note came from. A clean pass only clears
/// errors that a pass reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NoteKind {
    Info,
    PassError,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Editor {
    pub key: DraftKey,
    pub field: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovePicker {
    pub agent: String,
    pub choice: usize,
}

pub struct App {
    pub config: Config,
    command_tx: mpsc::Sender<PulseCommand>,
    pub agents: Vec<AgentState>,
    pub rooms: Vec<RoomState>,
    pub events: Vec<String>,
    pub balance: Option<BalanceHistory>,
    pub ideas: Vec<IdeaRecord>,
    pub timeline: TimelineBuffer,
    pub drafts: DraftBook,
    pub editor: Option<Editor>,
    pub picker: Option<MovePicker>,
    pub pending_delete: Option<EditRequest>,
    pub mode: Mode,
    pub scroll: u16,
    pub help_open: bool,
    pub selected: usize,
    pub status_note: Option<String>,
    note_kind: NoteKind,
    pub syncing: Option<Trigger>,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub generation: u64,
}

impl App {
    pub fn new(config: Config, command_tx: mpsc::Sender<PulseCommand>) -> Self {
        Self {
            config,
            command_tx,
            agents: Vec::new(),
            rooms: Vec::new(),
            events: Vec::new(),
            balance: None,
            ideas: Vec::new(),
            timeline: TimelineBuffer::new(),
            drafts: DraftBook::new(),
            editor: None,
            picker: None,
            pending_delete: None,
            mode: Mode::Map,
            scroll: 0,
            help_open: false,
            selected: 0,
            status_note: None,
            note_kind: NoteKind::Info,
            syncing: None,
            last_pass_at: None,
            generation: 0,
        }
    }

    fn note(&mut self, text: String) {
        self.status_note = Some(text);
        self.note_kind = NoteKind::Info;
    }

    fn error_note(&mut self, text: String) {
        self.status_note = Some(text);
        self.note_kind = NoteKind::Error;
    }

    fn pass_error_note(&mut self, text: String) {
        self.status_note = Some(text);
        self.note_kind = NoteKind::PassError;
    }

    pub fn note_is_error(&self) -> bool {
        self.status_note.is_some() && self.note_kind != NoteKind::Info
    }

    pub fn apply_pulse_event(&mut self, event: PulseEvent, at: DateTime<Utc>) {
        match event {
            PulseEvent::PassStarted(trigger) => {
                self.syncing = Some(trigger);
            }
            PulseEvent::Pass(outcome) => {
                self.syncing = None;
                self.apply_pass(outcome, at);
            }
            PulseEvent::EditApplied(request) => {
                if let Some(key) = request.draft_key() {
                    self.settle_draft(&key, &request);
                }
                self.note(format!("{} saved", request.summary()));
            }
            PulseEvent::EditFailed { request, error } => {
                self.error_note(format!("{} failed: {error}", request.summary()));
            }
        }
    }

    pub fn apply_pass(&mut self, outcome: PassOutcome, at: DateTime<Utc>) {
        self.last_pass_at = Some(at);
        match outcome {
            PassOutcome::Reconciled(report) => {
                let trigger = report.trigger;
                let partial = (!report.failures.is_empty()).then(|| report.failure_summary());
                self.generation = report.generation;
                let added = self.publish(report, at);
                match partial {
                    Some(summary) => {
                        self.pass_error_note(format!("partial refresh: {summary}"))
                    }
                    None if trigger == Trigger::Advance => {
                        self.note(format!("cycle advanced; {added} new timeline entries"))
                    }
                    None if self.note_kind == NoteKind::PassError => {
                        self.status_note = None;
                        self.note_kind = NoteKind::Info;
                    }
                    None => {}
                }
            }
            PassOutcome::Degraded(report) => {
                let summary = report.failure_summary();
                self.publish(report, at);
                self.pass_error_note(format!("refresh incomplete: {summary}"));
            }
            PassOutcome::Failed { trigger, message } => {
                self.pass_error_note(format!("{} failed: {message}", trigger.as_str()));
            }
        }
    }

    /// Drops the draft a confirmed write was built from. A draft edited
    /// again since the save no longer builds the same write, so it stays
    /// along with its editor.
    fn settle_draft(&mut self, key: &DraftKey, applied: &EditRequest) {
        let rebuilt = self.drafts.build_request(key, &self.agents, &self.rooms);
        if rebuilt.as_ref().ok() != Some(applied) {
            return;
        }
        self.drafts.discard(key);
        if self.editor.as_ref().map(|editor| &editor.key) == Some(key) {
            self.editor = None;
        }
    }

    /// Replaces displayed resources with whatever the pass resolved and
    /// records its timeline batch. Returns the number of new entries.
    fn publish(&mut self, report: PassReport, at: DateTime<Utc>) -> usize {
        let PassReport {
            agents,
            rooms,
            events,
            balance,
            ideas,
            timeline,
            ..
        } = report;
        if let Some(agents) = agents {
            self.agents = agents;
        }
        if let Some(rooms) = rooms {
            self.rooms = rooms;
        }
        if let Some(events) = events {
            self.events = events;
        }
        if balance.is_some() {
            self.balance = balance;
        }
        if let Some(ideas) = ideas {
            self.ideas = ideas;
        }
        self.clamp_selection();
        self.timeline.record(timeline, at)
    }

    pub fn selection_len(&self) -> usize {
        if self.mode.selects_rooms() {
            self.rooms.len()
        } else {
            self.agents.len()
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.selection_len();
        self.selected = if len == 0 {
            0
        } else {
            self.selected.min(len - 1)
        };
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.scroll = 0;
        self.picker = None;
        self.pending_delete = None;
        self.clamp_selection();
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.selection_len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = self.selected as isize + delta;
        self.selected = next.clamp(0, len as isize - 1) as usize;
    }

    pub fn selected_agent(&self) -> Option<&AgentState> {
        if self.mode.selects_rooms() {
            return None;
        }
        self.agents.get(self.selected)
    }

    pub fn selected_room(&self) -> Option<&RoomState> {
        if !self.mode.selects_rooms() {
            return None;
        }
        self.rooms.get(self.selected)
    }

    pub fn trigger(&mut self, trigger: Trigger) {
        // The worker serializes passes; a trigger sent mid-pass runs right after it.
        let label = match self.syncing {
            Some(_) => format!("{} (after current pass)", trigger.as_str()),
            None => trigger.as_str().to_string(),
        };
        self.queue(PulseCommand::Trigger(trigger), label);
    }

    pub fn open_move_picker(&mut self) {
        if self.rooms.is_empty() {
            self.note("no rooms to move to".to_string());
            return;
        }
        let Some(agent) = self.selected_agent() else {
            self.note("select an agent to move".to_string());
            return;
        };
        let choice = agent
            .current_room
            .as_deref()
            .and_then(|room| self.rooms.iter().position(|candidate| candidate.name == room))
            .unwrap_or(0);
        self.picker = Some(MovePicker {
            agent: agent.name.clone(),
            choice,
        });
    }

    pub fn move_picker_choice(&mut self, delta: isize) {
        let len = self.rooms.len();
        if let Some(picker) = self.picker.as_mut() {
            if len == 0 {
                return;
            }
            let next = picker.choice as isize + delta;
            picker.choice = next.rem_euclid(len as isize) as usize;
        }
    }

    pub fn commit_move_picker(&mut self, at: DateTime<Utc>) {
        let Some(picker) = self.picker.take() else {
            return;
        };
        let Some(room) = self.rooms.get(picker.choice).map(|room| room.name.clone()) else {
            return;
        };
        self.move_agent(&picker.agent, &room, at);
    }

    /// Relocates the agent on screen right away and sends the write. The next
    /// pass overwrites the room with whatever the backend reports.
    pub fn move_agent(&mut self, name: &str, room: &str, at: DateTime<Utc>) {
        let Some(agent) = self.agents.iter_mut().find(|agent| agent.name == name) else {
            self.error_note(format!("agent {name} not found"));
            return;
        };
        if agent.current_room.as_deref() == Some(room) {
            self.note(format!("{name} is already in {room}"));
            return;
        }
        agent.current_room = Some(room.to_string());
        self.timeline
            .record(vec![TimelineEvent::manual_move(name, room)], at);
        info!(event = "optimistic_move", agent = name, room);
        self.queue(
            PulseCommand::Edit(EditRequest::MoveAgent {
                name: name.to_string(),
                room: room.to_string(),
            }),
            format!("move {name}"),
        );
    }

    pub fn request_delete(&mut self) {
        let request = if let Some(room) = self.selected_room() {
            EditRequest::DeleteRoom {
                name: room.name.clone(),
            }
        } else if let Some(agent) = self.selected_agent() {
            EditRequest::DeleteAgent {
                name: agent.name.clone(),
            }
        } else {
            self.note("nothing selected".to_string());
            return;
        };
        self.note(format!("{}? press y to confirm", request.summary()));
        self.pending_delete = Some(request);
    }

    pub fn confirm_delete(&mut self) {
        let Some(request) = self.pending_delete.take() else {
            return;
        };
        match &request {
            EditRequest::DeleteAgent { name } => {
                self.agents.retain(|agent| &agent.name != name);
                self.drafts.discard(&DraftKey::Agent(name.clone()));
            }
            EditRequest::DeleteRoom { name } => {
                self.rooms.retain(|room| &room.name != name);
                for agent in &mut self.agents {
                    if agent.current_room.as_deref() == Some(name.as_str()) {
                        agent.current_room = None;
                    }
                }
                self.drafts.discard(&DraftKey::Room(name.clone()));
            }
            _ => {}
        }
        self.clamp_selection();
        let label = request.summary();
        self.queue(PulseCommand::Edit(request), label);
    }

    pub fn cancel_delete(&mut self) {
        if self.pending_delete.take().is_some() {
            self.note("delete cancelled".to_string());
        }
    }

    pub fn open_editor(&mut self, key: DraftKey) {
        let field = if key.is_new() { 0 } else { 1 };
        match self.drafts.open(key.clone(), &self.agents, &self.rooms) {
            Ok(_) => self.editor = Some(Editor { key, field }),
            Err(err) => self.error_note(err.to_string()),
        }
    }

    pub fn edit_selected(&mut self) {
        let key = if let Some(room) = self.selected_room() {
            DraftKey::Room(room.name.clone())
        } else if let Some(agent) = self.selected_agent() {
            DraftKey::Agent(agent.name.clone())
        } else {
            self.note("nothing selected".to_string());
            return;
        };
        self.open_editor(key);
    }

    pub fn create_new(&mut self) {
        let key = if self.mode.selects_rooms() {
            DraftKey::NewRoom
        } else {
            DraftKey::NewAgent
        };
        self.open_editor(key);
    }

    pub fn editor_draft(&self) -> Option<(&Editor, &Draft)> {
        let editor = self.editor.as_ref()?;
        self.drafts.get(&editor.key).map(|draft| (editor, draft))
    }

    pub fn editor_step(&mut self, delta: isize) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let Some(draft) = self.drafts.get(&editor.key) else {
            return;
        };
        let first = if editor.key.is_new() { 0 } else { 1 };
        let count = draft.labels().len() - first;
        let offset = (editor.field - first) as isize + delta;
        editor.field = first + offset.rem_euclid(count as isize) as usize;
    }

    pub fn editor_input(&mut self, ch: char) {
        if let Some(field) = self.editor_field_mut() {
            field.push(ch);
        }
    }

    pub fn editor_backspace(&mut self) {
        if let Some(field) = self.editor_field_mut() {
            field.pop();
        }
    }

    fn editor_field_mut(&mut self) -> Option<&mut String> {
        let editor = self.editor.as_ref()?;
        let field = editor.field;
        self.drafts.get_mut(&editor.key)?.value_mut(field)
    }

    /// Leaves the draft in place; it is dropped once the backend accepts the write.
    pub fn save_editor(&mut self) {
        let Some(editor) = self.editor.clone() else {
            return;
        };
        match self
            .drafts
            .build_request(&editor.key, &self.agents, &self.rooms)
        {
            Ok(request) => {
                self.editor = None;
                let label = request.summary();
                self.queue(PulseCommand::Edit(request), label);
            }
            Err(err) => self.error_note(format!("{}: {err}", editor.key.label())),
        }
    }

    pub fn cancel_editor(&mut self) {
        if let Some(editor) = self.editor.take() {
            self.drafts.discard(&editor.key);
            self.note(format!("{} discarded", editor.key.label()));
        }
    }

    fn queue(&mut self, command: PulseCommand, label: String) {
        match self.command_tx.try_send(command) {
            Ok(()) => self.note(format!("{label} queued")),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    event = "pulse_command_queue_drop",
                    reason = "queue_full",
                    command = %label,
                    capacity = COMMAND_QUEUE_CAPACITY
                );
                self.error_note("command queue full".to_string());
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(
                    event = "pulse_command_queue_drop",
                    reason = "channel_closed",
                    command = %label
                );
                self.error_note("pulse worker stopped".to_string());
            }
        }
    }
}
