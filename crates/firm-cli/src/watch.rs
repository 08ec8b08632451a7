use anyhow::{bail, Context, Result};
use chrono::Utc;
use firm_client::{Resource, SnapshotSource};
use firm_core::{diff_agents, AgentState, EventLedger, TimelineBuffer, TimelineEvent};
use std::time::Duration;
use tracing::debug;

const WATCHED: [Resource; 2] = [Resource::Agents, Resource::Events];

struct Observation {
    agents: Vec<AgentState>,
    events: Vec<String>,
}

async fn observe<S: SnapshotSource>(source: &S, label: &str) -> Result<Observation> {
    let snapshot = source.fetch_resources(&WATCHED).await;
    match (snapshot.agents, snapshot.events) {
        (Some(agents), Some(events)) => Ok(Observation { agents, events }),
        _ => bail!(
            "{label} snapshot incomplete: {}",
            snapshot
                .failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }
}

/// Takes two snapshots and returns what changed between them, newest first.
/// With `advance` the second snapshot comes from advancing one cycle instead
/// of waiting `gap`.
pub async fn watch_once<S: SnapshotSource>(
    source: &S,
    gap: Duration,
    advance: bool,
) -> Result<TimelineBuffer> {
    let before = observe(source, "first").await?;
    let after = if advance {
        let cycle = source
            .advance_cycle()
            .await
            .context("advancing the cycle")?;
        let events = match cycle.events {
            Some(events) => events,
            None => observe(source, "post-cycle").await?.events,
        };
        Observation {
            agents: cycle.agents,
            events,
        }
    } else {
        tokio::time::sleep(gap).await;
        observe(source, "second").await?
    };

    let mut batch: Vec<TimelineEvent> = diff_agents(&before.agents, &after.agents)
        .iter()
        .map(TimelineEvent::from_change)
        .collect();
    let ledger = EventLedger::from_events(&before.events);
    batch.extend(
        ledger
            .fresh(&after.events)
            .into_iter()
            .map(TimelineEvent::from_backend_event),
    );
    debug!(event = "cli_watch_batch", entries = batch.len(), advance);

    let mut timeline = TimelineBuffer::new();
    timeline.record(batch, Utc::now());
    Ok(timeline)
}
