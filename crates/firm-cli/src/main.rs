use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use firm_client::{
    BackendClient, Catalog, Mutations, Resource, SnapshotSource, DEFAULT_BACKEND_URL,
    DEFAULT_REQUEST_TIMEOUT,
};
use firm_core::wire::{
    AgentPatchBody, ModelChoiceBody, NewAgentBody, NewRoomBody, RoomPatchBody,
};
use firm_core::{AgentState, RoomState, TimelineEntry};
use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod watch;

#[derive(Parser)]
#[command(name = "firm")]
#[command(about = "Command-line client for the simulated company backend", long_about = None)]
struct Cli {
    /// Base URL of the simulation backend.
    #[arg(long, global = true, env = "FIRM_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    backend_url: String,
    #[arg(long, global = true, env = "FIRM_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List agents
    Agents,
    /// Show one agent
    Agent { name: String },
    /// List rooms with their occupants
    Rooms,
    /// Show one room
    Room { name: String },
    /// Advance the simulation one cycle
    Cycle,
    /// List free models the backend can assign
    Models,
    /// Ask the backend to pick a model for an agent
    ChooseModel {
        name: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        room: String,
    },
    AddAgent(AddAgentArgs),
    AddRoom(AddRoomArgs),
    EditAgent(EditAgentArgs),
    EditRoom(EditRoomArgs),
    RemoveAgent { name: String },
    RemoveRoom { name: String },
    /// Take two snapshots and print what changed between them
    Timeline {
        #[arg(long, default_value_t = 5)]
        wait_secs: u64,
        /// Advance one cycle instead of waiting
        #[arg(long)]
        advance: bool,
    },
}

#[derive(Args)]
struct AddAgentArgs {
    name: String,
    #[arg(long)]
    role: String,
    #[arg(long)]
    model: String,
    #[arg(long)]
    room: String,
    #[arg(long)]
    goal: Option<String>,
}

#[derive(Args)]
struct AddRoomArgs {
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    /// Comma separated
    #[arg(long, default_value = "")]
    inventory: String,
}

#[derive(Args)]
struct EditAgentArgs {
    name: String,
    #[arg(long)]
    role: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    room: Option<String>,
    #[arg(long)]
    goal: Option<String>,
    #[arg(long)]
    feedback: Option<String>,
}

#[derive(Args)]
struct EditRoomArgs {
    name: String,
    #[arg(long)]
    description: Option<String>,
    /// Comma separated; replaces the whole inventory
    #[arg(long)]
    inventory: Option<String>,
}

#[derive(Serialize)]
struct CycleSummary<'a> {
    balance: f64,
    history: &'a [f64],
    events: &'a [String],
    agents: usize,
    ideas: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let timeout = cli
        .request_timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
    let client = BackendClient::new(&cli.backend_url, timeout)
        .with_context(|| format!("invalid backend url {:?}", cli.backend_url))?;
    let json = cli.json;

    match cli.command {
        Commands::Agents => {
            let snapshot = client.fetch_resources(&[Resource::Agents]).await;
            let failures = snapshot.failure_summary();
            let Some(agents) = snapshot.agents else {
                bail!("could not list agents: {failures}");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&agents)?);
            } else if agents.is_empty() {
                println!("No agents.");
            } else {
                for agent in &agents {
                    println!("{}", agent_row(agent));
                }
            }
        }
        Commands::Agent { name } => {
            let agent = client.agent(&name).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&agent)?);
            } else {
                print!("{}", agent_detail(&agent));
            }
        }
        Commands::Rooms => {
            let snapshot = client
                .fetch_resources(&[Resource::Rooms, Resource::Agents])
                .await;
            let Some(rooms) = snapshot.rooms.as_ref() else {
                bail!("could not list rooms: {}", snapshot.failure_summary());
            };
            let agents = snapshot.agents.as_deref().unwrap_or_default();
            if json {
                println!("{}", serde_json::to_string_pretty(rooms)?);
            } else if rooms.is_empty() {
                println!("No rooms.");
            } else {
                for room in rooms {
                    println!("{}", room_row(room, agents));
                }
            }
        }
        Commands::Room { name } => {
            let room = client.room(&name).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&room)?);
            } else {
                println!("{}", room.name);
                println!("  description: {}", room.description);
                println!("  inventory:   {}", room.inventory.join(", "));
            }
        }
        Commands::Cycle => {
            let cycle = client.advance_cycle().await?;
            let events = cycle.events.as_deref().unwrap_or_default();
            if json {
                let summary = CycleSummary {
                    balance: cycle.balance.current,
                    history: &cycle.balance.history,
                    events,
                    agents: cycle.agents.len(),
                    ideas: cycle.ideas.len(),
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                match cycle.balance.delta() {
                    Some(delta) => {
                        println!("balance {:.2} ({delta:+.2})", cycle.balance.current)
                    }
                    None => println!("balance {:.2}", cycle.balance.current),
                }
                for event in events {
                    println!("  {event}");
                }
                for idea in &cycle.ideas {
                    println!(
                        "  idea: {} ({})",
                        idea.description,
                        idea.outcome.as_deref().unwrap_or("pending")
                    );
                }
            }
        }
        Commands::Models => {
            let models = client.free_models().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&models)?);
            } else {
                for model in models {
                    println!("{model}");
                }
            }
        }
        Commands::ChooseModel { name, role, room } => {
            let choice = client
                .choose_model(&ModelChoiceBody {
                    nome: name,
                    funcao: role,
                    sala: room,
                })
                .await?;
            if json {
                let payload = serde_json::json!({
                    "model": choice.model,
                    "reasoning": choice.reasoning,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", choice.model);
                if !choice.reasoning.is_empty() {
                    println!("  {}", choice.reasoning);
                }
            }
        }
        Commands::AddAgent(args) => {
            client.create_agent(&new_agent_body(args)).await?;
            println!("agent created");
        }
        Commands::AddRoom(args) => {
            client
                .create_room(&NewRoomBody {
                    nome: args.name,
                    descricao: args.description,
                    inventario: split_list(&args.inventory),
                })
                .await?;
            println!("room created");
        }
        Commands::EditAgent(args) => {
            let name = args.name.clone();
            let patch = agent_patch(args);
            if patch.is_empty() {
                bail!("nothing to change; pass at least one of --role --model --room --goal --feedback");
            }
            client.update_agent(&name, &patch).await?;
            println!("agent {name} updated");
        }
        Commands::EditRoom(args) => {
            let patch = RoomPatchBody {
                descricao: args.description,
                inventario: args.inventory.as_deref().map(split_list),
            };
            if patch.is_empty() {
                bail!("nothing to change; pass --description or --inventory");
            }
            client.update_room(&args.name, &patch).await?;
            println!("room {} updated", args.name);
        }
        Commands::RemoveAgent { name } => {
            client.delete_agent(&name).await?;
            println!("agent {name} removed");
        }
        Commands::RemoveRoom { name } => {
            client.delete_room(&name).await?;
            println!("room {name} removed");
        }
        Commands::Timeline { wait_secs, advance } => {
            let timeline =
                watch::watch_once(&client, Duration::from_secs(wait_secs), advance).await?;
            let entries: Vec<&TimelineEntry> = timeline.iter().collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No changes.");
            } else {
                for entry in entries {
                    println!("{}", timeline_row(entry));
                }
            }
        }
    }

    Ok(())
}

fn init_logging() {
    let level = std::env::var("FIRM_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn new_agent_body(args: AddAgentArgs) -> NewAgentBody {
    NewAgentBody {
        nome: args.name,
        funcao: args.role,
        modelo_llm: args.model,
        local: args.room,
        objetivo: args.goal.filter(|goal| !goal.trim().is_empty()),
    }
}

fn agent_patch(args: EditAgentArgs) -> AgentPatchBody {
    AgentPatchBody {
        funcao: args.role,
        modelo_llm: args.model,
        local: args.room,
        objetivo: args.goal,
        feedback_ceo: args.feedback,
    }
}

fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn agent_row(agent: &AgentState) -> String {
    format!(
        "{:<16} {:<14} {:<12} {}",
        agent.name,
        agent.room_label(),
        agent.role,
        agent.last_action().unwrap_or("-")
    )
}

fn agent_detail(agent: &AgentState) -> String {
    let mut out = format!("{}\n", agent.name);
    out.push_str(&format!("  role:     {}\n", agent.role));
    out.push_str(&format!("  model:    {}\n", agent.model));
    out.push_str(&format!("  room:     {}\n", agent.room_label()));
    out.push_str(&format!("  mood:     {}\n", agent.emotional_state));
    if !agent.goal.is_empty() {
        out.push_str(&format!("  goal:     {}\n", agent.goal));
    }
    if !agent.feedback.is_empty() {
        out.push_str(&format!("  feedback: {}\n", agent.feedback));
    }
    for action in agent.action_history.iter().rev().take(5) {
        out.push_str(&format!("  - {action}\n"));
    }
    out
}

fn room_row(room: &RoomState, agents: &[AgentState]) -> String {
    let here: Vec<&str> = firm_core::occupants(&room.name, agents)
        .into_iter()
        .map(|agent| agent.name.as_str())
        .collect();
    let who = if here.is_empty() {
        "nobody".to_string()
    } else {
        here.join(", ")
    };
    format!("{:<16} {who}", room.name)
}

fn timeline_row(entry: &TimelineEntry) -> String {
    let who = if entry.is_system() {
        "system"
    } else {
        entry.actor()
    };
    let mut row = format!("[{}] {who}", entry.origin());
    if !entry.room().is_empty() {
        row.push_str(&format!(" @{}", entry.room()));
    }
    row.push_str(&format!(": {}", entry.action()));
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_edit_agent_flags() {
        let cli = Cli::try_parse_from([
            "firm",
            "--backend-url",
            "http://sim:9000",
            "edit-agent",
            "Alice",
            "--room",
            "Lab",
        ])
        .unwrap();
        assert_eq!(cli.backend_url, "http://sim:9000");
        let Commands::EditAgent(args) = cli.command else {
            panic!("expected edit-agent");
        };
        let patch = agent_patch(args);
        assert_eq!(patch.local.as_deref(), Some("Lab"));
        assert_eq!(patch.funcao, None);
    }

    #[test]
    fn timeline_defaults_to_five_second_gap() {
        let cli = Cli::try_parse_from(["firm", "timeline"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Timeline {
                wait_secs: 5,
                advance: false
            }
        ));
    }

    #[test]
    fn blank_goal_is_dropped_from_create_body() {
        let body = new_agent_body(AddAgentArgs {
            name: "Dana".to_string(),
            role: "sales".to_string(),
            model: "mistral".to_string(),
            room: "Lab".to_string(),
            goal: Some("  ".to_string()),
        });
        assert_eq!(body.objetivo, None);
    }

    #[test]
    fn split_list_trims_and_skips_blanks() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn room_row_lists_occupants() {
        let agents = vec![AgentState {
            name: "Alice".to_string(),
            current_room: Some("Lab".to_string()),
            ..AgentState::default()
        }];
        let lab = RoomState {
            name: "Lab".to_string(),
            ..RoomState::default()
        };
        let office = RoomState {
            name: "Office".to_string(),
            ..RoomState::default()
        };
        assert!(room_row(&lab, &agents).ends_with("Alice"));
        assert!(room_row(&office, &agents).ends_with("nobody"));
    }
}
