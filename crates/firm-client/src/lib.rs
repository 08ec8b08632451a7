use async_trait::async_trait;
use firm_core::wire::{
    AgentPatchBody, CycleSnapshot, ModelChoice, ModelChoiceBody, NewAgentBody, NewRoomBody,
    RoomPatchBody,
};
use firm_core::{AgentState, BalanceHistory, RoomState};
use std::fmt;

mod client;
mod error;

pub use client::{BackendClient, DEFAULT_BACKEND_URL, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ClientError, FetchCause, FetchFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Agents,
    Rooms,
    Events,
    Balance,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Agents,
        Resource::Rooms,
        Resource::Events,
        Resource::Balance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Agents => "agents",
            Resource::Rooms => "rooms",
            Resource::Events => "events",
            Resource::Balance => "balance",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Resource::Agents => "agentes",
            Resource::Rooms => "locais",
            Resource::Events => "eventos",
            Resource::Balance => "lucro",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one fetch round. Each resource is either present or listed in `failures`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub agents: Option<Vec<AgentState>>,
    pub rooms: Option<Vec<RoomState>>,
    pub events: Option<Vec<String>>,
    pub balance: Option<BalanceHistory>,
    pub failures: Vec<FetchFailure>,
}

impl Snapshot {
    pub fn failed(&self, resource: Resource) -> bool {
        self.failures
            .iter()
            .any(|failure| failure.resource == resource)
    }

    pub fn resolved(&self) -> Vec<Resource> {
        let mut out = Vec::new();
        if self.agents.is_some() {
            out.push(Resource::Agents);
        }
        if self.rooms.is_some() {
            out.push(Resource::Rooms);
        }
        if self.events.is_some() {
            out.push(Resource::Events);
        }
        if self.balance.is_some() {
            out.push(Resource::Balance);
        }
        out
    }

    /// True when nothing resolved at all.
    pub fn is_total_failure(&self) -> bool {
        self.resolved().is_empty()
    }

    /// Folds a follow-up fetch into this snapshot; only fills resources still missing.
    pub fn fill_from(&mut self, other: Snapshot) {
        if self.agents.is_none() {
            self.agents = other.agents;
        }
        if self.rooms.is_none() {
            self.rooms = other.rooms;
        }
        if self.events.is_none() {
            self.events = other.events;
        }
        if self.balance.is_none() {
            self.balance = other.balance;
        }
        self.failures.extend(other.failures);
    }

    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Read side of the backend as seen by the reconciliation loop.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_resources(&self, resources: &[Resource]) -> Snapshot;

    async fn fetch_snapshot(&self) -> Snapshot {
        self.fetch_resources(&Resource::ALL).await
    }

    /// Advances the simulation one cycle and returns the snapshot it produced.
    async fn advance_cycle(&self) -> Result<CycleSnapshot, ClientError>;
}

/// Write side of the backend used by the edit layer.
#[async_trait]
pub trait Mutations: Send + Sync {
    async fn create_agent(&self, body: &NewAgentBody) -> Result<(), ClientError>;
    async fn update_agent(&self, name: &str, body: &AgentPatchBody) -> Result<(), ClientError>;
    async fn delete_agent(&self, name: &str) -> Result<(), ClientError>;
    async fn create_room(&self, body: &NewRoomBody) -> Result<(), ClientError>;
    async fn update_room(&self, name: &str, body: &RoomPatchBody) -> Result<(), ClientError>;
    async fn delete_room(&self, name: &str) -> Result<(), ClientError>;
}

/// Calls that only the command-line client uses.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn agent(&self, name: &str) -> Result<AgentState, ClientError>;
    async fn room(&self, name: &str) -> Result<RoomState, ClientError>;
    async fn free_models(&self) -> Result<Vec<String>, ClientError>;
    async fn choose_model(&self, body: &ModelChoiceBody) -> Result<ModelChoice, ClientError>;
}
