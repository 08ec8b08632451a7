use crate::edits::EditRequest;
use firm_client::{ClientError, FetchFailure, Mutations, Resource, Snapshot, SnapshotSource};
use firm_core::{
    diff_agents, AgentState, BalanceHistory, EventLedger, IdeaRecord, RoomState, TimelineEvent,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    sync::{mpsc, Mutex as AsyncMutex},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Periodic,
    /// Advance the simulation one cycle, then reconcile against what it returned.
    Advance,
    /// Full refetch requested by the user or forced after a save.
    Resync,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Periodic => "periodic",
            Trigger::Advance => "advance",
            Trigger::Resync => "resync",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassPhase {
    Idle,
    Fetching,
    Reconciling,
    Failed,
}

/// Last snapshot accepted as ground truth.
#[derive(Debug, Default)]
pub struct Baseline {
    agents: Vec<AgentState>,
    events: EventLedger,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub trigger: Trigger,
    pub agents: Option<Vec<AgentState>>,
    pub rooms: Option<Vec<RoomState>>,
    pub events: Option<Vec<String>>,
    pub balance: Option<BalanceHistory>,
    pub ideas: Option<Vec<IdeaRecord>>,
    pub timeline: Vec<TimelineEvent>,
    pub failures: Vec<FetchFailure>,
    pub generation: u64,
}

impl PassReport {
    fn from_snapshot(trigger: Trigger, snapshot: Snapshot, generation: u64) -> Self {
        Self {
            trigger,
            agents: snapshot.agents,
            rooms: snapshot.rooms,
            events: snapshot.events,
            balance: snapshot.balance,
            ideas: None,
            timeline: Vec::new(),
            failures: snapshot.failures,
            generation,
        }
    }

    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// Baseline replaced; `timeline` holds the new entries.
    Reconciled(PassReport),
    /// Agents or events missing: resolved resources are published, baseline untouched.
    Degraded(PassReport),
    /// Nothing usable came back; baseline and display stay as they were.
    Failed { trigger: Trigger, message: String },
}

pub struct Reconciler<S> {
    source: Arc<S>,
    baseline: AsyncMutex<Baseline>,
    phase: Mutex<PassPhase>,
}

impl<S: SnapshotSource> Reconciler<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            baseline: AsyncMutex::new(Baseline::default()),
            phase: Mutex::new(PassPhase::Idle),
        }
    }

    fn set_phase(&self, next: PassPhase) {
        if let Ok(mut phase) = self.phase.lock() {
            let previous = std::mem::replace(&mut *phase, next);
            if previous != next {
                debug!(event = "pass_phase", from = ?previous, to = ?next);
            }
        }
    }

    /// Runs one fetch → diff → dedup pass. The baseline lock is held for the
    /// whole pass, so a second trigger waits for this one to finish.
    pub async fn run_pass(&self, trigger: Trigger) -> PassOutcome {
        let mut baseline = self.baseline.lock().await;
        self.set_phase(PassPhase::Fetching);
        let previous = baseline.agents.clone();

        let fetched = match trigger {
            Trigger::Advance => self.advance().await,
            Trigger::Periodic | Trigger::Resync => Ok((self.source.fetch_snapshot().await, None)),
        };
        let (snapshot, ideas) = match fetched {
            Ok(value) => value,
            Err(err) => return self.fail(trigger, err.to_string()),
        };
        if snapshot.is_total_failure() {
            let message = format!("all resources failed: {}", snapshot.failure_summary());
            return self.fail(trigger, message);
        }

        self.set_phase(PassPhase::Reconciling);
        let mut report = PassReport::from_snapshot(trigger, snapshot, baseline.generation);
        report.ideas = ideas;

        let (Some(agents), Some(events)) = (report.agents.as_ref(), report.events.as_ref()) else {
            warn!(
                event = "pass_degraded",
                trigger = trigger.as_str(),
                failures = %report.failure_summary()
            );
            self.set_phase(PassPhase::Idle);
            return PassOutcome::Degraded(report);
        };

        let mut batch: Vec<TimelineEvent> = diff_agents(&previous, agents)
            .iter()
            .map(TimelineEvent::from_change)
            .collect();
        batch.extend(
            baseline
                .events
                .fresh(events)
                .into_iter()
                .map(TimelineEvent::from_backend_event),
        );

        *baseline = Baseline {
            agents: agents.clone(),
            events: EventLedger::from_events(events),
            generation: baseline.generation + 1,
        };
        report.generation = baseline.generation;
        report.timeline = batch;

        info!(
            event = "pass_reconciled",
            trigger = trigger.as_str(),
            generation = report.generation,
            agents = agents.len(),
            timeline = report.timeline.len(),
            partial_failures = report.failures.len()
        );
        self.set_phase(PassPhase::Idle);
        PassOutcome::Reconciled(report)
    }

    async fn advance(&self) -> Result<(Snapshot, Option<Vec<IdeaRecord>>), ClientError> {
        let cycle = self.source.advance_cycle().await?;
        let mut snapshot = Snapshot {
            agents: Some(cycle.agents),
            balance: Some(cycle.balance),
            events: cycle.events,
            ..Snapshot::default()
        };
        let mut missing = vec![Resource::Rooms];
        if snapshot.events.is_none() {
            missing.push(Resource::Events);
        }
        debug!(event = "advance_fill", missing = ?missing);
        let rest = self.source.fetch_resources(&missing).await;
        snapshot.fill_from(rest);
        Ok((snapshot, Some(cycle.ideas)))
    }

    fn fail(&self, trigger: Trigger, message: String) -> PassOutcome {
        self.set_phase(PassPhase::Failed);
        warn!(event = "pass_failed", trigger = trigger.as_str(), error = %message);
        self.set_phase(PassPhase::Idle);
        PassOutcome::Failed { trigger, message }
    }
}

#[cfg(test)]
impl<S: SnapshotSource> Reconciler<S> {
    pub fn phase(&self) -> PassPhase {
        self.phase
            .lock()
            .map(|phase| *phase)
            .unwrap_or(PassPhase::Idle)
    }

    pub async fn generation(&self) -> u64 {
        self.baseline.lock().await.generation
    }

    pub async fn baseline_agents(&self) -> Vec<AgentState> {
        self.baseline.lock().await.agents.clone()
    }
}

#[derive(Debug)]
pub enum PulseCommand {
    Trigger(Trigger),
    Edit(EditRequest),
}

#[derive(Debug)]
pub enum PulseEvent {
    PassStarted(Trigger),
    Pass(PassOutcome),
    EditApplied(EditRequest),
    EditFailed { request: EditRequest, error: String },
}

/// Worker that owns all network traffic. Passes and edits run one at a time
/// in arrival order; ticks that land during a pass are delayed, not stacked.
pub async fn pulse_loop<B>(
    backend: Arc<B>,
    poll_every: Duration,
    mut commands: mpsc::Receiver<PulseCommand>,
    events: mpsc::Sender<PulseEvent>,
) where
    B: SnapshotSource + Mutations + 'static,
{
    let reconciler = Reconciler::new(backend.clone());
    let mut ticker = tokio::time::interval(poll_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let trigger = tokio::select! {
            _ = ticker.tick() => Trigger::Periodic,
            command = commands.recv() => match command {
                None => break,
                Some(PulseCommand::Trigger(trigger)) => trigger,
                Some(PulseCommand::Edit(request)) => {
                    let resync = request.forces_resync();
                    match request.execute(backend.as_ref()).await {
                        Ok(()) => {
                            if events.send(PulseEvent::EditApplied(request)).await.is_err() {
                                break;
                            }
                            if !resync {
                                continue;
                            }
                            Trigger::Resync
                        }
                        Err(err) => {
                            let event = PulseEvent::EditFailed {
                                request,
                                error: err.to_string(),
                            };
                            if events.send(event).await.is_err() {
                                break;
                            }
                            continue;
                        }
                    }
                }
            },
        };

        if events.send(PulseEvent::PassStarted(trigger)).await.is_err() {
            break;
        }
        let outcome = reconciler.run_pass(trigger).await;
        if trigger != Trigger::Periodic {
            ticker.reset();
        }
        if events.send(PulseEvent::Pass(outcome)).await.is_err() {
            break;
        }
    }
    debug!(event = "pulse_loop_stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use firm_client::FetchCause;
    use firm_core::wire::{
        AgentPatchBody, CycleSnapshot, NewAgentBody, NewRoomBody, RoomPatchBody,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    fn agent(name: &str, actions: &[&str]) -> AgentState {
        AgentState {
            name: name.to_string(),
            current_room: Some("Lab".to_string()),
            action_history: actions.iter().map(|a| a.to_string()).collect(),
            ..AgentState::default()
        }
    }

    fn full(agents: Vec<AgentState>, events: &[&str]) -> Snapshot {
        Snapshot {
            agents: Some(agents),
            rooms: Some(vec![RoomState {
                name: "Lab".to_string(),
                ..RoomState::default()
            }]),
            events: Some(events.iter().map(|e| e.to_string()).collect()),
            balance: Some(BalanceHistory {
                current: 10.0,
                history: vec![10.0],
            }),
            failures: Vec::new(),
        }
    }

    fn failure(resource: Resource) -> FetchFailure {
        FetchFailure {
            resource,
            cause: FetchCause::Status {
                code: 500,
                body: String::new(),
            },
        }
    }

    /// Hands out scripted snapshots; optionally blocks each fetch on a permit.
    #[derive(Default)]
    struct ScriptedSource {
        snapshots: Mutex<VecDeque<Snapshot>>,
        cycles: Mutex<VecDeque<Result<CycleSnapshot, ClientError>>>,
        gate: Option<Arc<Semaphore>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fetched: Mutex<Vec<Vec<Resource>>>,
        writes: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn with(snapshots: Vec<Snapshot>) -> Self {
            Self {
                snapshots: Mutex::new(snapshots.into()),
                ..Self::default()
            }
        }

        fn push_cycle(&self, cycle: Result<CycleSnapshot, ClientError>) {
            self.cycles.lock().unwrap().push_back(cycle);
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn fetch_resources(&self, resources: &[Resource]) -> Snapshot {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate open").forget();
            }
            self.fetched.lock().unwrap().push(resources.to_vec());
            let snapshot = self
                .snapshots
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            snapshot
        }

        async fn advance_cycle(&self) -> Result<CycleSnapshot, ClientError> {
            self.cycles
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::request("advance cycle", FetchCause::Transport("none".into()))))
        }
    }

    #[async_trait]
    impl Mutations for ScriptedSource {
        async fn create_agent(&self, body: &NewAgentBody) -> Result<(), ClientError> {
            self.writes.lock().unwrap().push(format!("create agent {}", body.nome));
            Ok(())
        }
        async fn update_agent(&self, name: &str, _body: &AgentPatchBody) -> Result<(), ClientError> {
            self.writes.lock().unwrap().push(format!("update agent {name}"));
            Ok(())
        }
        async fn delete_agent(&self, name: &str) -> Result<(), ClientError> {
            Err(ClientError::request(
                "delete agent",
                FetchCause::Status {
                    code: 404,
                    body: name.to_string(),
                },
            ))
        }
        async fn create_room(&self, body: &NewRoomBody) -> Result<(), ClientError> {
            self.writes.lock().unwrap().push(format!("create room {}", body.nome));
            Ok(())
        }
        async fn update_room(&self, name: &str, _body: &RoomPatchBody) -> Result<(), ClientError> {
            self.writes.lock().unwrap().push(format!("update room {name}"));
            Ok(())
        }
        async fn delete_room(&self, name: &str) -> Result<(), ClientError> {
            self.writes.lock().unwrap().push(format!("delete room {name}"));
            Ok(())
        }
    }

    fn reconciled(outcome: PassOutcome) -> PassReport {
        match outcome {
            PassOutcome::Reconciled(report) => report,
            other => panic!("expected reconciled pass, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_pass_reports_changed_actions_then_fresh_events() {
        let source = Arc::new(ScriptedSource::with(vec![
            full(vec![agent("Alice", &["wait"]), agent("Bob", &["idle"])], &["A", "B"]),
            full(
                vec![agent("Alice", &["wait", "move:Lab"]), agent("Bob", &["idle"])],
                &["B", "C"],
            ),
        ]));
        let reconciler = Reconciler::new(source);

        let first = reconciled(reconciler.run_pass(Trigger::Periodic).await);
        let actions: Vec<&str> = first.timeline.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["A", "B"]);

        let second = reconciled(reconciler.run_pass(Trigger::Periodic).await);
        assert_eq!(second.timeline.len(), 2);
        assert_eq!(second.timeline[0].actor, "Alice");
        assert_eq!(second.timeline[0].action, "move:Lab");
        assert_eq!(second.timeline[0].room, "Lab");
        assert_eq!(second.timeline[1].action, "C");
        assert!(second.timeline[1].actor.is_empty());
        assert_eq!(second.generation, 2);
        assert_eq!(reconciler.phase(), PassPhase::Idle);
    }

    #[tokio::test]
    async fn total_failure_leaves_baseline_untouched() {
        let mut dead = Snapshot::default();
        dead.failures = Resource::ALL.iter().copied().map(failure).collect();
        let source = Arc::new(ScriptedSource::with(vec![
            full(vec![agent("Alice", &["wait"])], &["A"]),
            dead,
            full(vec![agent("Alice", &["wait", "code"])], &["A"]),
        ]));
        let reconciler = Reconciler::new(source);

        reconciled(reconciler.run_pass(Trigger::Periodic).await);
        let before = reconciler.baseline_agents().await;

        let outcome = reconciler.run_pass(Trigger::Periodic).await;
        let PassOutcome::Failed { message, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(message.contains("all resources failed"));
        assert_eq!(reconciler.baseline_agents().await, before);
        assert_eq!(reconciler.generation().await, 1);

        let third = reconciled(reconciler.run_pass(Trigger::Periodic).await);
        assert_eq!(third.timeline.len(), 1);
        assert_eq!(third.timeline[0].action, "code");
    }

    #[tokio::test]
    async fn balance_failure_still_reconciles_other_resources() {
        let mut partial = full(vec![agent("Alice", &["wait", "sell"])], &["A", "sold"]);
        partial.balance = None;
        partial.failures.push(failure(Resource::Balance));
        let source = Arc::new(ScriptedSource::with(vec![
            full(vec![agent("Alice", &["wait"])], &["A"]),
            partial,
        ]));
        let reconciler = Reconciler::new(source);
        reconciled(reconciler.run_pass(Trigger::Periodic).await);

        let report = reconciled(reconciler.run_pass(Trigger::Periodic).await);
        assert!(report.balance.is_none());
        assert!(report.rooms.is_some());
        assert_eq!(report.timeline.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.generation, 2);
    }

    #[tokio::test]
    async fn missing_events_degrades_without_touching_baseline() {
        let mut partial = full(vec![agent("Alice", &["wait", "sell"])], &[]);
        partial.events = None;
        partial.failures.push(failure(Resource::Events));
        let source = Arc::new(ScriptedSource::with(vec![
            full(vec![agent("Alice", &["wait"])], &["A"]),
            partial,
            full(vec![agent("Alice", &["wait", "sell"])], &["A"]),
        ]));
        let reconciler = Reconciler::new(source);
        reconciled(reconciler.run_pass(Trigger::Periodic).await);

        let PassOutcome::Degraded(report) = reconciler.run_pass(Trigger::Periodic).await else {
            panic!("expected degraded pass");
        };
        assert!(report.timeline.is_empty());
        assert!(report.agents.is_some());
        assert_eq!(reconciler.generation().await, 1);

        // The change is not lost: the next complete pass still diffs against the old baseline.
        let next = reconciled(reconciler.run_pass(Trigger::Periodic).await);
        assert_eq!(next.timeline.len(), 1);
        assert_eq!(next.timeline[0].action, "sell");
    }

    #[tokio::test]
    async fn advance_fills_rooms_and_events_from_follow_up_fetch() {
        let mut rest = full(Vec::new(), &["cycle 1 closed"]);
        rest.agents = None;
        rest.balance = None;
        let source = Arc::new(ScriptedSource::with(vec![
            full(vec![agent("Alice", &["wait"])], &[]),
            rest,
        ]));
        source.push_cycle(Ok(CycleSnapshot {
            agents: vec![agent("Alice", &["wait", "pitch"])],
            balance: BalanceHistory {
                current: 42.0,
                history: vec![10.0, 42.0],
            },
            events: None,
            ideas: vec![IdeaRecord {
                description: "course".to_string(),
                ..IdeaRecord::default()
            }],
        }));
        let reconciler = Reconciler::new(source.clone());
        reconciled(reconciler.run_pass(Trigger::Periodic).await);

        let report = reconciled(reconciler.run_pass(Trigger::Advance).await);
        assert_eq!(report.trigger, Trigger::Advance);
        assert_eq!(report.balance.as_ref().map(|b| b.current), Some(42.0));
        assert!(report.rooms.is_some());
        assert_eq!(report.ideas.as_ref().map(Vec::len), Some(1));
        let actions: Vec<&str> = report.timeline.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["pitch", "cycle 1 closed"]);
        assert_eq!(
            source.fetched.lock().unwrap().last().cloned(),
            Some(vec![Resource::Rooms, Resource::Events])
        );
    }

    #[tokio::test]
    async fn advance_with_events_only_fetches_rooms() {
        let rooms_only = Snapshot {
            rooms: Some(vec![RoomState {
                name: "Garage".to_string(),
                ..RoomState::default()
            }]),
            ..Snapshot::default()
        };
        let source = Arc::new(ScriptedSource::with(vec![
            full(vec![agent("Alice", &["wait"])], &["opened"]),
            rooms_only,
        ]));
        source.push_cycle(Ok(CycleSnapshot {
            agents: vec![agent("Alice", &["wait"])],
            balance: BalanceHistory::default(),
            events: Some(vec!["opened".to_string(), "hired Bob".to_string()]),
            ideas: Vec::new(),
        }));
        let reconciler = Reconciler::new(source.clone());
        reconciled(reconciler.run_pass(Trigger::Periodic).await);

        let report = reconciled(reconciler.run_pass(Trigger::Advance).await);
        assert_eq!(
            source.fetched.lock().unwrap().last().cloned(),
            Some(vec![Resource::Rooms])
        );
        assert_eq!(
            report.rooms.as_ref().map(|rooms| rooms[0].name.as_str()),
            Some("Garage")
        );
        let actions: Vec<&str> = report.timeline.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["hired Bob"]);
    }

    #[tokio::test]
    async fn failed_advance_is_a_failed_pass() {
        let source = Arc::new(ScriptedSource::with(vec![full(
            vec![agent("Alice", &["wait"])],
            &[],
        )]));
        source.push_cycle(Err(ClientError::request(
            "advance cycle",
            FetchCause::Status {
                code: 500,
                body: "llm down".to_string(),
            },
        )));
        let reconciler = Reconciler::new(source);
        reconciled(reconciler.run_pass(Trigger::Periodic).await);

        let outcome = reconciler.run_pass(Trigger::Advance).await;
        assert!(matches!(outcome, PassOutcome::Failed { trigger: Trigger::Advance, .. }));
        assert_eq!(reconciler.generation().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_triggers_are_serialized() {
        let gate = Arc::new(Semaphore::new(0));
        let source = Arc::new(ScriptedSource {
            snapshots: Mutex::new(
                vec![
                    full(vec![agent("Alice", &["wait"])], &[]),
                    full(vec![agent("Alice", &["wait", "code"])], &[]),
                ]
                .into(),
            ),
            gate: Some(gate.clone()),
            ..ScriptedSource::default()
        });
        let reconciler = Arc::new(Reconciler::new(source.clone()));

        let periodic = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.run_pass(Trigger::Periodic).await })
        };
        let manual = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.run_pass(Trigger::Resync).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.in_flight.load(Ordering::SeqCst), 1);
        gate.add_permits(2);

        let first = periodic.await.expect("periodic task");
        let second = manual.await.expect("manual task");
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(reconciler.generation().await, 2);

        let mut generations = vec![reconciled(first).generation, reconciled(second).generation];
        generations.sort_unstable();
        assert_eq!(generations, vec![1, 2]);
        assert_eq!(
            reconciler.baseline_agents().await[0].last_action(),
            Some("code")
        );
    }

    #[tokio::test]
    async fn pulse_loop_runs_initial_pass_and_serves_commands_in_order() {
        let source = Arc::new(ScriptedSource::with(vec![
            full(vec![agent("Alice", &["wait"])], &[]),
            full(vec![agent("Alice", &["wait"])], &[]),
        ]));
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let worker = tokio::spawn(pulse_loop(
            source.clone(),
            Duration::from_secs(3600),
            cmd_rx,
            event_tx,
        ));

        assert!(matches!(
            event_rx.recv().await,
            Some(PulseEvent::PassStarted(Trigger::Periodic))
        ));
        assert!(matches!(
            event_rx.recv().await,
            Some(PulseEvent::Pass(PassOutcome::Reconciled(_)))
        ));

        cmd_tx
            .send(PulseCommand::Edit(EditRequest::SaveAgent {
                name: "Alice".to_string(),
                patch: AgentPatchBody {
                    objetivo: Some("grow".to_string()),
                    ..AgentPatchBody::default()
                },
            }))
            .await
            .unwrap();
        cmd_tx
            .send(PulseCommand::Edit(EditRequest::DeleteAgent {
                name: "Ghost".to_string(),
            }))
            .await
            .unwrap();

        assert!(matches!(event_rx.recv().await, Some(PulseEvent::EditApplied(_))));
        assert!(matches!(
            event_rx.recv().await,
            Some(PulseEvent::PassStarted(Trigger::Resync))
        ));
        assert!(matches!(event_rx.recv().await, Some(PulseEvent::Pass(_))));
        match event_rx.recv().await {
            Some(PulseEvent::EditFailed { error, .. }) => assert!(error.contains("404")),
            other => panic!("expected edit failure, got {other:?}"),
        }
        assert_eq!(
            source.writes.lock().unwrap().clone(),
            vec!["update agent Alice".to_string()]
        );

        drop(cmd_tx);
        worker.await.expect("worker exits when commands close");
    }
}
