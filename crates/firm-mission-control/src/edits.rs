use firm_client::{ClientError, Mutations};
use firm_core::wire::{AgentPatchBody, NewAgentBody, NewRoomBody, RoomPatchBody};
use firm_core::{AgentState, RoomState};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DraftKey {
    Agent(String),
    Room(String),
    NewAgent,
    NewRoom,
}

impl DraftKey {
    pub fn is_new(&self) -> bool {
        matches!(self, DraftKey::NewAgent | DraftKey::NewRoom)
    }

    pub fn label(&self) -> String {
        match self {
            DraftKey::Agent(name) => format!("agent {name}"),
            DraftKey::Room(name) => format!("room {name}"),
            DraftKey::NewAgent => "new agent".to_string(),
            DraftKey::NewRoom => "new room".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentDraft {
    pub name: String,
    pub role: String,
    pub model: String,
    pub room: String,
    pub goal: String,
    pub feedback: String,
}

impl AgentDraft {
    pub fn from_agent(agent: &AgentState) -> Self {
        Self {
            name: agent.name.clone(),
            role: agent.role.clone(),
            model: agent.model.clone(),
            room: agent.room_label().to_string(),
            goal: agent.goal.clone(),
            feedback: agent.feedback.clone(),
        }
    }

    /// Only fields that differ from `current` end up in the patch.
    fn patch_against(&self, current: &AgentState) -> AgentPatchBody {
        AgentPatchBody {
            funcao: changed(&self.role, &current.role),
            modelo_llm: changed(&self.model, &current.model),
            local: changed(&self.room, current.room_label()),
            objetivo: changed(&self.goal, &current.goal),
            feedback_ceo: changed(&self.feedback, &current.feedback),
        }
    }

    fn create_body(&self) -> Result<NewAgentBody, DraftError> {
        Ok(NewAgentBody {
            nome: required(&self.name, "name")?,
            funcao: required(&self.role, "role")?,
            modelo_llm: required(&self.model, "model")?,
            local: required(&self.room, "room")?,
            objetivo: optional(&self.goal),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoomDraft {
    pub name: String,
    pub description: String,
    /// Comma separated, as typed.
    pub inventory: String,
}

impl RoomDraft {
    pub fn from_room(room: &RoomState) -> Self {
        Self {
            name: room.name.clone(),
            description: room.description.clone(),
            inventory: room.inventory.join(", "),
        }
    }

    fn patch_against(&self, current: &RoomState) -> RoomPatchBody {
        let inventory = parse_inventory(&self.inventory);
        RoomPatchBody {
            descricao: changed(&self.description, &current.description),
            inventario: (inventory != current.inventory).then_some(inventory),
        }
    }

    fn create_body(&self) -> Result<NewRoomBody, DraftError> {
        Ok(NewRoomBody {
            nome: required(&self.name, "name")?,
            descricao: self.description.trim().to_string(),
            inventario: parse_inventory(&self.inventory),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Draft {
    Agent(AgentDraft),
    Room(RoomDraft),
}

const AGENT_FIELDS: [&str; 6] = ["name", "role", "model", "room", "goal", "feedback"];
const ROOM_FIELDS: [&str; 3] = ["name", "description", "inventory"];

impl Draft {
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Draft::Agent(_) => &AGENT_FIELDS,
            Draft::Room(_) => &ROOM_FIELDS,
        }
    }

    pub fn value(&self, index: usize) -> &str {
        match self {
            Draft::Agent(draft) => match index {
                0 => &draft.name,
                1 => &draft.role,
                2 => &draft.model,
                3 => &draft.room,
                4 => &draft.goal,
                5 => &draft.feedback,
                _ => "",
            },
            Draft::Room(draft) => match index {
                0 => &draft.name,
                1 => &draft.description,
                2 => &draft.inventory,
                _ => "",
            },
        }
    }

    pub fn value_mut(&mut self, index: usize) -> Option<&mut String> {
        match self {
            Draft::Agent(draft) => match index {
                0 => Some(&mut draft.name),
                1 => Some(&mut draft.role),
                2 => Some(&mut draft.model),
                3 => Some(&mut draft.room),
                4 => Some(&mut draft.goal),
                5 => Some(&mut draft.feedback),
                _ => None,
            },
            Draft::Room(draft) => match index {
                0 => Some(&mut draft.name),
                1 => Some(&mut draft.description),
                2 => Some(&mut draft.inventory),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("no draft open for {0}")]
    NoDraft(String),
    #[error("{0} no longer exists")]
    UnknownEntity(String),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("nothing changed")]
    NothingChanged,
}

/// Unsaved edits keyed by entity. A later write to the same key replaces the
/// earlier one; fields are never merged.
#[derive(Debug, Default)]
pub struct DraftBook {
    drafts: HashMap<DraftKey, Draft>,
}

impl DraftBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the draft for `key`, seeding it from current state when none exists yet.
    pub fn open(
        &mut self,
        key: DraftKey,
        agents: &[AgentState],
        rooms: &[RoomState],
    ) -> Result<&mut Draft, DraftError> {
        if !self.drafts.contains_key(&key) {
            let seeded = match &key {
                DraftKey::Agent(name) => agents
                    .iter()
                    .find(|agent| &agent.name == name)
                    .map(|agent| Draft::Agent(AgentDraft::from_agent(agent)))
                    .ok_or_else(|| DraftError::UnknownEntity(key.label()))?,
                DraftKey::Room(name) => rooms
                    .iter()
                    .find(|room| &room.name == name)
                    .map(|room| Draft::Room(RoomDraft::from_room(room)))
                    .ok_or_else(|| DraftError::UnknownEntity(key.label()))?,
                DraftKey::NewAgent => Draft::Agent(AgentDraft {
                    room: rooms.first().map(|room| room.name.clone()).unwrap_or_default(),
                    ..AgentDraft::default()
                }),
                DraftKey::NewRoom => Draft::Room(RoomDraft::default()),
            };
            self.drafts.insert(key.clone(), seeded);
        }
        self.drafts
            .get_mut(&key)
            .ok_or_else(|| DraftError::NoDraft(key.label()))
    }

    pub fn get(&self, key: &DraftKey) -> Option<&Draft> {
        self.drafts.get(key)
    }

    pub fn get_mut(&mut self, key: &DraftKey) -> Option<&mut Draft> {
        self.drafts.get_mut(key)
    }

    pub fn discard(&mut self, key: &DraftKey) -> Option<Draft> {
        self.drafts.remove(key)
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Turns the draft into the write it stands for. The draft itself stays
    /// in the book until the write is confirmed.
    pub fn build_request(
        &self,
        key: &DraftKey,
        agents: &[AgentState],
        rooms: &[RoomState],
    ) -> Result<EditRequest, DraftError> {
        let draft = self
            .drafts
            .get(key)
            .ok_or_else(|| DraftError::NoDraft(key.label()))?;
        match (key, draft) {
            (DraftKey::Agent(name), Draft::Agent(draft)) => {
                let current = agents
                    .iter()
                    .find(|agent| &agent.name == name)
                    .ok_or_else(|| DraftError::UnknownEntity(key.label()))?;
                let patch = draft.patch_against(current);
                if patch.is_empty() {
                    return Err(DraftError::NothingChanged);
                }
                Ok(EditRequest::SaveAgent {
                    name: name.clone(),
                    patch,
                })
            }
            (DraftKey::Room(name), Draft::Room(draft)) => {
                let current = rooms
                    .iter()
                    .find(|room| &room.name == name)
                    .ok_or_else(|| DraftError::UnknownEntity(key.label()))?;
                let patch = draft.patch_against(current);
                if patch.is_empty() {
                    return Err(DraftError::NothingChanged);
                }
                Ok(EditRequest::SaveRoom {
                    name: name.clone(),
                    patch,
                })
            }
            (DraftKey::NewAgent, Draft::Agent(draft)) => {
                Ok(EditRequest::CreateAgent(draft.create_body()?))
            }
            (DraftKey::NewRoom, Draft::Room(draft)) => {
                Ok(EditRequest::CreateRoom(draft.create_body()?))
            }
            _ => Err(DraftError::NoDraft(key.label())),
        }
    }
}

/// A write headed for the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditRequest {
    MoveAgent { name: String, room: String },
    SaveAgent { name: String, patch: AgentPatchBody },
    CreateAgent(NewAgentBody),
    SaveRoom { name: String, patch: RoomPatchBody },
    CreateRoom(NewRoomBody),
    DeleteAgent { name: String },
    DeleteRoom { name: String },
}

impl EditRequest {
    pub fn summary(&self) -> String {
        match self {
            EditRequest::MoveAgent { name, room } => format!("move {name} to {room}"),
            EditRequest::SaveAgent { name, .. } => format!("save agent {name}"),
            EditRequest::CreateAgent(body) => format!("create agent {}", body.nome),
            EditRequest::SaveRoom { name, .. } => format!("save room {name}"),
            EditRequest::CreateRoom(body) => format!("create room {}", body.nome),
            EditRequest::DeleteAgent { name } => format!("delete agent {name}"),
            EditRequest::DeleteRoom { name } => format!("delete room {name}"),
        }
    }

    /// Saves refetch everything afterwards; a move waits for the next regular pass.
    pub fn forces_resync(&self) -> bool {
        !matches!(self, EditRequest::MoveAgent { .. })
    }

    /// Draft this request was built from, if any.
    pub fn draft_key(&self) -> Option<DraftKey> {
        match self {
            EditRequest::SaveAgent { name, .. } => Some(DraftKey::Agent(name.clone())),
            EditRequest::SaveRoom { name, .. } => Some(DraftKey::Room(name.clone())),
            EditRequest::CreateAgent(_) => Some(DraftKey::NewAgent),
            EditRequest::CreateRoom(_) => Some(DraftKey::NewRoom),
            EditRequest::MoveAgent { .. }
            | EditRequest::DeleteAgent { .. }
            | EditRequest::DeleteRoom { .. } => None,
        }
    }

    pub async fn execute<M: Mutations>(&self, backend: &M) -> Result<(), ClientError> {
        match self {
            EditRequest::MoveAgent { name, room } => {
                let patch = AgentPatchBody {
                    local: Some(room.clone()),
                    ..AgentPatchBody::default()
                };
                backend.update_agent(name, &patch).await
            }
            EditRequest::SaveAgent { name, patch } => backend.update_agent(name, patch).await,
            EditRequest::CreateAgent(body) => backend.create_agent(body).await,
            EditRequest::SaveRoom { name, patch } => backend.update_room(name, patch).await,
            EditRequest::CreateRoom(body) => backend.create_room(body).await,
            EditRequest::DeleteAgent { name } => backend.delete_agent(name).await,
            EditRequest::DeleteRoom { name } => backend.delete_room(name).await,
        }
    }
}

pub fn parse_inventory(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn changed(draft: &str, current: &str) -> Option<String> {
    let draft = draft.trim();
    (draft != current.trim()).then(|| draft.to_string())
}

fn required(value: &str, field: &'static str) -> Result<String, DraftError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DraftError::MissingField(field));
    }
    Ok(value.to_string())
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
