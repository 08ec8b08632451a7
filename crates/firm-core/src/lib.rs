use serde::{Deserialize, Serialize};
use std::fmt;

pub mod dedup;
pub mod diff;
pub mod timeline;
pub mod wire;

pub use dedup::EventLedger;
pub use diff::{diff_agents, AgentChange};
pub use timeline::{TimelineBuffer, TIMELINE_CAPACITY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AgentState {
    pub name: String,
    pub role: String,
    pub model: String,
    pub current_room: Option<String>,
    pub action_history: Vec<String>,
    pub emotional_state: i64,
    pub goal: String,
    pub feedback: String,
    #[serde(default)]
    pub room_history: Vec<String>,
}

impl AgentState {
    pub fn last_action(&self) -> Option<&str> {
        self.action_history.last().map(String::as_str)
    }

    pub fn room_label(&self) -> &str {
        self.current_room.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RoomState {
    pub name: String,
    pub description: String,
    pub inventory: Vec<String>,
}

/// Agents whose current room is `room`, in agent order.
pub fn occupants<'a>(room: &str, agents: &'a [AgentState]) -> Vec<&'a AgentState> {
    agents
        .iter()
        .filter(|agent| agent.current_room.as_deref() == Some(room))
        .collect()
}

/// Agents with no room, or a room that is not in `rooms`.
pub fn unplaced<'a>(agents: &'a [AgentState], rooms: &[RoomState]) -> Vec<&'a AgentState> {
    agents
        .iter()
        .filter(|agent| match agent.current_room.as_deref() {
            Some(room) => !rooms.iter().any(|candidate| candidate.name == room),
            None => true,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BalanceHistory {
    pub current: f64,
    pub history: Vec<f64>,
}

impl BalanceHistory {
    pub fn delta(&self) -> Option<f64> {
        let [.., prev, last] = self.history.as_slice() else {
            return None;
        };
        Some(last - prev)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IdeaRecord {
    pub description: String,
    pub rationale: String,
    pub author: String,
    pub validated: bool,
    pub executed: bool,
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryOrigin {
    /// Derived from an agent's action history changing between snapshots.
    Cycle,
    /// A raw backend event string not seen in the previous snapshot.
    Event,
    /// A local edit made from the dashboard.
    Manual,
}

impl EntryOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryOrigin::Cycle => "cycle",
            EntryOrigin::Event => "event",
            EntryOrigin::Manual => "manual",
        }
    }
}

impl fmt::Display for EntryOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timeline content before an id is minted for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    pub origin: EntryOrigin,
    pub actor: String,
    pub action: String,
    pub room: String,
    pub reason: Option<String>,
}

impl TimelineEvent {
    pub fn from_change(change: &AgentChange) -> Self {
        Self {
            origin: EntryOrigin::Cycle,
            actor: change.agent.name.clone(),
            action: change.last_action.clone(),
            room: change.agent.room_label().to_string(),
            reason: None,
        }
    }

    pub fn from_backend_event(text: &str) -> Self {
        Self {
            origin: EntryOrigin::Event,
            actor: String::new(),
            action: text.to_string(),
            room: String::new(),
            reason: None,
        }
    }

    pub fn manual_move(agent: &str, room: &str) -> Self {
        Self {
            origin: EntryOrigin::Manual,
            actor: agent.to_string(),
            action: format!("moved to {room}"),
            room: room.to_string(),
            reason: Some("manual move".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    id: u64,
    origin: EntryOrigin,
    actor: String,
    action: String,
    room: String,
    reason: Option<String>,
}

impl TimelineEntry {
    pub(crate) fn mint(id: u64, event: TimelineEvent) -> Self {
        Self {
            id,
            origin: event.origin,
            actor: event.actor,
            action: event.action,
            room: event.room,
            reason: event.reason,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn origin(&self) -> EntryOrigin {
        self.origin
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_system(&self) -> bool {
        self.actor.is_empty()
    }
}
