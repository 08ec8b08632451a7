//! Backend wire format.
//!
//! The simulation backend speaks Portuguese snake_case keys. Everything in
//! this module maps those payloads to and from the model types; nothing else
//! in the workspace should see a backend key.

use crate::{AgentState, BalanceHistory, IdeaRecord, RoomState};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("payload missing field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentWire {
    pub nome: String,
    #[serde(default)]
    pub funcao: String,
    #[serde(default)]
    pub modelo_llm: String,
    #[serde(default)]
    pub local_atual: Option<String>,
    #[serde(default)]
    pub historico_acoes: Vec<String>,
    #[serde(default)]
    pub historico_locais: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_int")]
    pub estado_emocional: i64,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub objetivo_atual: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub feedback_ceo: String,
}

impl From<AgentWire> for AgentState {
    fn from(wire: AgentWire) -> Self {
        AgentState {
            name: wire.nome,
            role: wire.funcao,
            model: wire.modelo_llm,
            current_room: wire.local_atual.filter(|room| !room.trim().is_empty()),
            action_history: wire.historico_acoes,
            emotional_state: wire.estado_emocional,
            goal: wire.objetivo_atual,
            feedback: wire.feedback_ceo,
            room_history: wire.historico_locais,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomWire {
    pub nome: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub descricao: String,
    #[serde(default)]
    pub inventario: Vec<String>,
    // Occupancy is recomputed from agents; the backend copy is accepted and dropped.
    #[serde(default, skip_serializing)]
    pub agentes_presentes: Vec<String>,
}

impl From<RoomWire> for RoomState {
    fn from(wire: RoomWire) -> Self {
        RoomState {
            name: wire.nome,
            description: wire.descricao,
            inventory: wire.inventario,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BalanceWire {
    pub saldo: f64,
    #[serde(default)]
    pub historico_saldo: Vec<f64>,
}

impl From<BalanceWire> for BalanceHistory {
    fn from(wire: BalanceWire) -> Self {
        BalanceHistory {
            current: wire.saldo,
            history: wire.historico_saldo,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdeaWire {
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub justificativa: String,
    #[serde(default)]
    pub autor: String,
    #[serde(default)]
    pub validada: bool,
    #[serde(default)]
    pub executada: bool,
    #[serde(default)]
    pub resultado: Option<Value>,
}

impl From<IdeaWire> for IdeaRecord {
    fn from(wire: IdeaWire) -> Self {
        let outcome = match wire.resultado {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
        };
        IdeaRecord {
            description: wire.descricao,
            rationale: wire.justificativa,
            author: wire.autor,
            validated: wire.validada,
            executed: wire.executada,
            outcome,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CycleWire {
    agentes: Option<Vec<AgentWire>>,
    saldo: Option<f64>,
    #[serde(default)]
    historico_saldo: Vec<f64>,
    #[serde(default)]
    eventos: Option<Vec<String>>,
    #[serde(default)]
    ideias: Vec<IdeaWire>,
}

/// Snapshot returned by the advance-cycle call.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSnapshot {
    pub agents: Vec<AgentState>,
    pub balance: BalanceHistory,
    /// Absent when the backend does not echo its event log.
    pub events: Option<Vec<String>>,
    pub ideas: Vec<IdeaRecord>,
}

pub fn decode_agents(bytes: &[u8]) -> Result<Vec<AgentState>, WireError> {
    let agents: Vec<AgentWire> = serde_json::from_slice(bytes)?;
    Ok(agents.into_iter().map(AgentState::from).collect())
}

pub fn decode_agent(bytes: &[u8]) -> Result<AgentState, WireError> {
    let agent: AgentWire = serde_json::from_slice(bytes)?;
    Ok(agent.into())
}

pub fn decode_rooms(bytes: &[u8]) -> Result<Vec<RoomState>, WireError> {
    let rooms: Vec<RoomWire> = serde_json::from_slice(bytes)?;
    Ok(rooms.into_iter().map(RoomState::from).collect())
}

pub fn decode_room(bytes: &[u8]) -> Result<RoomState, WireError> {
    let room: RoomWire = serde_json::from_slice(bytes)?;
    Ok(room.into())
}

pub fn decode_events(bytes: &[u8]) -> Result<Vec<String>, WireError> {
    let events: Vec<Value> = serde_json::from_slice(bytes)?;
    Ok(events.into_iter().map(event_text).collect())
}

pub fn decode_balance(bytes: &[u8]) -> Result<BalanceHistory, WireError> {
    let balance: BalanceWire = serde_json::from_slice(bytes)?;
    Ok(balance.into())
}

pub fn decode_cycle(bytes: &[u8]) -> Result<CycleSnapshot, WireError> {
    let cycle: CycleWire = serde_json::from_slice(bytes)?;
    let agents = cycle.agentes.ok_or(WireError::MissingField("agentes"))?;
    let saldo = cycle.saldo.ok_or(WireError::MissingField("saldo"))?;
    Ok(CycleSnapshot {
        agents: agents.into_iter().map(AgentState::from).collect(),
        balance: BalanceHistory {
            current: saldo,
            history: cycle.historico_saldo,
        },
        events: cycle.eventos,
        ideas: cycle.ideias.into_iter().map(IdeaRecord::from).collect(),
    })
}

fn event_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewAgentBody {
    pub nome: String,
    pub funcao: String,
    pub modelo_llm: String,
    pub local: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objetivo: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct AgentPatchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funcao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modelo_llm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objetivo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_ceo: Option<String>,
}

impl AgentPatchBody {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewRoomBody {
    pub nome: String,
    pub descricao: String,
    pub inventario: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct RoomPatchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventario: Option<Vec<String>>,
}

impl RoomPatchBody {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModelChoiceBody {
    pub nome: String,
    pub funcao: String,
    pub sala: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ModelChoice {
    #[serde(rename = "modelo")]
    pub model: String,
    #[serde(rename = "raciocinio", default)]
    pub reasoning: String,
}

fn deserialize_nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// Accepts integers, floats (truncated), numeric strings or null.
fn deserialize_lenient_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| serde::de::Error::custom("invalid integer")),
        Value::String(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
        _ => Err(serde::de::Error::custom("expected number for emotional state")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn agent_payload_maps_backend_keys() {
        let body = json!([{
            "nome": "Alice",
            "funcao": "Ideacao",
            "modelo_llm": "gpt",
            "local_atual": "Lab",
            "historico_acoes": ["wait", "move:Lab"],
            "historico_interacoes": [],
            "historico_locais": ["Office", "Lab"],
            "objetivo_atual": null,
            "feedback_ceo": "keep going",
            "estado_emocional": 2.0
        }]);
        let agents = decode_agents(body.to_string().as_bytes()).unwrap();
        assert_eq!(agents.len(), 1);
        let alice = &agents[0];
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.role, "Ideacao");
        assert_eq!(alice.current_room.as_deref(), Some("Lab"));
        assert_eq!(alice.last_action(), Some("move:Lab"));
        assert_eq!(alice.emotional_state, 2);
        assert_eq!(alice.goal, "");
        assert_eq!(alice.feedback, "keep going");
        assert_eq!(alice.room_history, vec!["Office", "Lab"]);
    }

    #[test]
    fn blank_room_is_treated_as_no_room() {
        let body = json!({"nome": "Bob", "local_atual": ""});
        let bob = decode_agent(body.to_string().as_bytes()).unwrap();
        assert_eq!(bob.current_room, None);
    }

    #[test]
    fn room_payload_drops_backend_occupancy() {
        let body = json!([{
            "nome": "Lab",
            "descricao": "R&D",
            "inventario": ["laptop"],
            "agentes_presentes": ["Alice"]
        }]);
        let rooms = decode_rooms(body.to_string().as_bytes()).unwrap();
        assert_eq!(
            rooms,
            vec![RoomState {
                name: "Lab".to_string(),
                description: "R&D".to_string(),
                inventory: vec!["laptop".to_string()],
            }]
        );
    }

    #[test]
    fn cycle_payload_requires_agents_and_balance() {
        let missing = json!({"saldo": 1.0});
        assert!(matches!(
            decode_cycle(missing.to_string().as_bytes()),
            Err(WireError::MissingField("agentes"))
        ));

        let body = json!({
            "agentes": [],
            "saldo": 12.5,
            "historico_saldo": [10.0, 12.5],
            "ideias": [{
                "descricao": "ebook",
                "justificativa": "cheap",
                "autor": "Alice",
                "validada": true,
                "executada": false,
                "resultado": null
            }]
        });
        let cycle = decode_cycle(body.to_string().as_bytes()).unwrap();
        assert_eq!(cycle.balance.current, 12.5);
        assert_eq!(cycle.events, None);
        assert_eq!(cycle.ideas[0].author, "Alice");
        assert!(cycle.ideas[0].validated);
    }

    #[test]
    fn non_string_events_are_rendered_as_json_text() {
        let body = json!(["hired Bob", {"kind": "sale"}]);
        let events = decode_events(body.to_string().as_bytes()).unwrap();
        assert_eq!(events[0], "hired Bob");
        assert_eq!(events[1], r#"{"kind":"sale"}"#);
    }

    #[test]
    fn patch_body_omits_unset_fields() {
        let patch = AgentPatchBody {
            local: Some("Lab".to_string()),
            ..AgentPatchBody::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"local": "Lab"}));
        assert!(!patch.is_empty());
        assert!(RoomPatchBody::default().is_empty());
    }
}
