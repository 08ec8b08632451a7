use crate::error::truncate_body;
use crate::{
    Catalog, ClientError, FetchCause, FetchFailure, Mutations, Resource, Snapshot, SnapshotSource,
};
use async_trait::async_trait;
use firm_core::wire::{
    self, AgentPatchBody, CycleSnapshot, ModelChoice, ModelChoiceBody, NewAgentBody, NewRoomBody,
    RoomPatchBody,
};
use firm_core::{AgentState, BalanceHistory, RoomState};
use futures_util::future::join_all;
use reqwest::{RequestBuilder, Url};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

const CYCLE_PATH: [&str; 2] = ["ciclo", "next"];

/// Whether a single call reads or changes backend state; picks the log events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CallKind {
    Read,
    Write,
}

impl CallKind {
    fn ok_event(self) -> &'static str {
        match self {
            CallKind::Read => "backend_read",
            CallKind::Write => "backend_mutation",
        }
    }

    fn failure_event(self) -> &'static str {
        match self {
            CallKind::Read => "backend_read_failed",
            CallKind::Write => "backend_mutation_failed",
        }
    }
}

enum Payload {
    Agents(Vec<AgentState>),
    Rooms(Vec<RoomState>),
    Events(Vec<String>),
    Balance(BalanceHistory),
}

#[derive(Clone, Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = parse_base_url(base_url)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, FetchCause> {
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|err| FetchCause::Transport(err.to_string()))?;
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|err| FetchCause::Transport(err.to_string()))?;
            if !status.is_success() {
                return Err(FetchCause::Status {
                    code: status.as_u16(),
                    body: truncate_body(&String::from_utf8_lossy(&body)),
                });
            }
            Ok(body.to_vec())
        };
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(FetchCause::Timeout(self.timeout)),
        }
    }

    async fn fetch_one(&self, resource: Resource) -> Result<Payload, FetchCause> {
        let body = self
            .send(self.http.get(self.endpoint(&[resource.path()])))
            .await?;
        let decoded = match resource {
            Resource::Agents => wire::decode_agents(&body).map(Payload::Agents),
            Resource::Rooms => wire::decode_rooms(&body).map(Payload::Rooms),
            Resource::Events => wire::decode_events(&body).map(Payload::Events),
            Resource::Balance => wire::decode_balance(&body).map(Payload::Balance),
        };
        decoded.map_err(|err| FetchCause::Decode(err.to_string()))
    }

    async fn call(
        &self,
        kind: CallKind,
        op: &str,
        request: RequestBuilder,
    ) -> Result<Vec<u8>, ClientError> {
        match self.send(request).await {
            Ok(body) => {
                debug!(event = kind.ok_event(), op, "ok");
                Ok(body)
            }
            Err(cause) => {
                warn!(event = kind.failure_event(), op, error = %cause);
                Err(ClientError::request(op, cause))
            }
        }
    }

    async fn mutate(&self, op: &str, request: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        self.call(CallKind::Write, op, request).await
    }

    async fn read(&self, op: &str, segments: &[&str]) -> Result<Vec<u8>, ClientError> {
        let request = self.http.get(self.endpoint(segments));
        self.call(CallKind::Read, op, request).await
    }
}

#[async_trait]
impl SnapshotSource for BackendClient {
    async fn fetch_resources(&self, resources: &[Resource]) -> Snapshot {
        let results = join_all(resources.iter().map(|resource| async move {
            (*resource, self.fetch_one(*resource).await)
        }))
        .await;

        let mut snapshot = Snapshot::default();
        for (resource, result) in results {
            match result {
                Ok(Payload::Agents(agents)) => snapshot.agents = Some(agents),
                Ok(Payload::Rooms(rooms)) => snapshot.rooms = Some(rooms),
                Ok(Payload::Events(events)) => snapshot.events = Some(events),
                Ok(Payload::Balance(balance)) => snapshot.balance = Some(balance),
                Err(cause) => {
                    warn!(event = "resource_fetch_failed", resource = %resource, error = %cause);
                    snapshot.failures.push(FetchFailure { resource, cause });
                }
            }
        }
        snapshot
    }

    async fn advance_cycle(&self) -> Result<CycleSnapshot, ClientError> {
        let op = "advance cycle";
        let body = self
            .mutate(op, self.http.post(self.endpoint(&CYCLE_PATH)))
            .await?;
        wire::decode_cycle(&body)
            .map_err(|err| ClientError::request(op, FetchCause::Decode(err.to_string())))
    }
}

#[async_trait]
impl Mutations for BackendClient {
    async fn create_agent(&self, body: &NewAgentBody) -> Result<(), ClientError> {
        let request = self.http.post(self.endpoint(&["agentes"])).json(body);
        self.mutate("create agent", request).await.map(|_| ())
    }

    async fn update_agent(&self, name: &str, body: &AgentPatchBody) -> Result<(), ClientError> {
        let request = self.http.put(self.endpoint(&["agentes", name])).json(body);
        self.mutate("update agent", request).await.map(|_| ())
    }

    async fn delete_agent(&self, name: &str) -> Result<(), ClientError> {
        let request = self.http.delete(self.endpoint(&["agentes", name]));
        self.mutate("delete agent", request).await.map(|_| ())
    }

    async fn create_room(&self, body: &NewRoomBody) -> Result<(), ClientError> {
        let request = self.http.post(self.endpoint(&["locais"])).json(body);
        self.mutate("create room", request).await.map(|_| ())
    }

    async fn update_room(&self, name: &str, body: &RoomPatchBody) -> Result<(), ClientError> {
        let request = self.http.put(self.endpoint(&["locais", name])).json(body);
        self.mutate("update room", request).await.map(|_| ())
    }

    async fn delete_room(&self, name: &str) -> Result<(), ClientError> {
        let request = self.http.delete(self.endpoint(&["locais", name]));
        self.mutate("delete room", request).await.map(|_| ())
    }
}

#[async_trait]
impl Catalog for BackendClient {
    async fn agent(&self, name: &str) -> Result<AgentState, ClientError> {
        let op = "get agent";
        let body = self.read(op, &["agentes", name]).await?;
        wire::decode_agent(&body)
            .map_err(|err| ClientError::request(op, FetchCause::Decode(err.to_string())))
    }

    async fn room(&self, name: &str) -> Result<RoomState, ClientError> {
        let op = "get room";
        let body = self.read(op, &["locais", name]).await?;
        wire::decode_room(&body)
            .map_err(|err| ClientError::request(op, FetchCause::Decode(err.to_string())))
    }

    async fn free_models(&self) -> Result<Vec<String>, ClientError> {
        let op = "list free models";
        let body = self.read(op, &["modelos-livres"]).await?;
        serde_json::from_slice(&body)
            .map_err(|err| ClientError::request(op, FetchCause::Decode(err.to_string())))
    }

    async fn choose_model(&self, body: &ModelChoiceBody) -> Result<ModelChoice, ClientError> {
        let op = "choose model";
        let request = self
            .http
            .post(self.endpoint(&["agentes", "escolher-modelo"]))
            .json(body);
        let response = self.call(CallKind::Read, op, request).await?;
        serde_json::from_slice(&response)
            .map_err(|err| ClientError::request(op, FetchCause::Decode(err.to_string())))
    }
}

/// Accepts `host:port` shorthand and strips trailing slashes.
pub(crate) fn parse_base_url(input: &str) -> Result<Url, ClientError> {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ClientError::InvalidUrl {
            url: input.to_string(),
            reason: "empty".to_string(),
        });
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|err| ClientError::InvalidUrl {
        url: input.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidUrl {
            url: input.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(base, DEFAULT_REQUEST_TIMEOUT).unwrap()
    }

    #[test]
    fn endpoint_joins_segments_onto_base() {
        let client = client("http://localhost:8000/");
        assert_eq!(
            client.endpoint(&["agentes"]).as_str(),
            "http://localhost:8000/agentes"
        );
        assert_eq!(
            client.endpoint(&CYCLE_PATH).as_str(),
            "http://localhost:8000/ciclo/next"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = client("https://example.test/api");
        assert_eq!(
            client.endpoint(&["locais"]).as_str(),
            "https://example.test/api/locais"
        );
    }

    #[test]
    fn names_are_percent_encoded_as_single_segments() {
        let client = client("http://localhost:8000");
        assert_eq!(
            client.endpoint(&["agentes", "Ana Maria/2"]).as_str(),
            "http://localhost:8000/agentes/Ana%20Maria%2F2"
        );
    }

    #[test]
    fn reads_and_writes_log_under_separate_events() {
        assert_eq!(CallKind::Read.failure_event(), "backend_read_failed");
        assert_eq!(CallKind::Write.failure_event(), "backend_mutation_failed");
        assert_ne!(CallKind::Read.ok_event(), CallKind::Write.ok_event());
    }

    #[test]
    fn base_url_accepts_host_port_shorthand() {
        let url = parse_base_url("127.0.0.1:9000").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn base_url_rejects_other_schemes_and_blank_input() {
        assert!(matches!(
            parse_base_url("ftp://example.test"),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(parse_base_url("   ").is_err());
    }
}
