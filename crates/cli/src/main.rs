//! Mission board CLI.

mod config;

use std::io::Read;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mission_core::{actors, Board, Column, ExecutionStatus, MissionId};
use mission_execution::RunAccepted;
use mission_work::{MoveRequest, NewMission};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "mission")]
#[command(about = "Mission board with proof-gated completion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Board document path (overrides the config file)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a mission in the Inbox
    Create {
        /// Title
        title: String,
        /// Mission id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Description
        #[arg(long, default_value = "")]
        description: String,
        /// Owning agent
        #[arg(long, default_value = "")]
        agent: String,
        /// Kind (inferred when omitted)
        #[arg(long)]
        kind: Option<String>,
        /// Risk level (0-2)
        #[arg(long, default_value = "0")]
        risk: u8,
    },
    /// Move a mission to another stage
    Move {
        /// Mission ID
        id: String,
        /// Target stage
        to: String,
        #[command(flatten)]
        opts: MoveOpts,
    },
    /// Dispatch a mission to the executor and wait for the outcome
    Run {
        /// Mission ID
        id: String,
    },
    /// Record execution evidence
    Proof {
        /// Mission ID
        id: String,
        /// Evidence entry (repeatable)
        #[arg(long = "evidence", short = 'e')]
        evidence: Vec<String>,
        /// New execution status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a mission's audit timeline
    Timeline {
        /// Mission ID
        id: String,
    },
    /// Delete a mission card
    Delete {
        /// Mission ID
        id: String,
        /// Actor
        #[arg(long, default_value = actors::CLIENT)]
        actor: String,
    },
    /// Approve a mission, optionally moving it
    Approve {
        /// Mission ID
        id: String,
        /// Target stage (stays in place when omitted)
        #[arg(long, default_value = "")]
        to: String,
        #[command(flatten)]
        opts: MoveOpts,
    },
    /// Grant monarch approval, optionally moving the mission
    MonarchOk {
        /// Mission ID
        id: String,
        /// Target stage (stays in place when omitted)
        #[arg(long, default_value = "")]
        to: String,
        #[command(flatten)]
        opts: MoveOpts,
    },
    /// Reply as monarch: send to Rework and run again
    MonarchReply {
        /// Mission ID
        id: String,
        /// Reply text
        reply: String,
        /// Actor
        #[arg(long, default_value = actors::CLIENT)]
        actor: String,
    },
    /// Print the board
    Board,
    /// Replace the column layout from a JSON file ("-" for stdin)
    Sync {
        /// Layout file
        file: PathBuf,
        /// Actor
        #[arg(long, default_value = actors::CLIENT)]
        actor: String,
    },
    /// Print the board summary
    Telemetry,
}

#[derive(clap::Args)]
struct MoveOpts {
    /// Stage the caller believes the mission is in
    #[arg(long)]
    from: Option<String>,
    /// Actor
    #[arg(long, default_value = actors::CLIENT)]
    actor: String,
    /// Reason
    #[arg(long, default_value = "")]
    reason: String,
    /// Idempotency key
    #[arg(long)]
    transition_id: Option<String>,
}

impl MoveOpts {
    fn request(self, id: String, to: String) -> MoveRequest {
        MoveRequest {
            mission_id: MissionId::new(id),
            from: self.from,
            to,
            actor: self.actor,
            reason: self.reason,
            transition_id: self.transition_id,
        }
    }
}

fn init_logging() {
    // stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?.with_store(cli.store);
    let control = config.build().await?;

    match cli.command {
        Commands::Create { title, id, description, agent, kind, risk } => {
            let (created, accepted) = control
                .create_and_dispatch(NewMission {
                    id,
                    title,
                    description,
                    agent,
                    kind,
                    risk_level: risk,
                })
                .await?;
            print_json(&created)?;
            if let Some(accepted) = accepted {
                report_run(accepted).await?;
            }
        }
        Commands::Move { id, to, opts } => {
            print_json(&control.move_mission(opts.request(id, to)).await?)?;
        }
        Commands::Run { id } => {
            let accepted = control.run_mission(&MissionId::new(id)).await?;
            report_run(accepted).await?;
        }
        Commands::Proof { id, evidence, status } => {
            let status = status
                .map(|s| s.parse::<ExecutionStatus>())
                .transpose()?;
            let record = control
                .record_proof(&MissionId::new(id), evidence, status)
                .await?;
            print_json(&record)?;
        }
        Commands::Timeline { id } => {
            print_json(&control.timeline(&MissionId::new(id)).await?)?;
        }
        Commands::Delete { id, actor } => {
            let removed = control.delete_card(&MissionId::new(id), &actor).await?;
            print_json(&serde_json::json!({ "removedFromColumns": removed }))?;
        }
        Commands::Approve { id, to, opts } => {
            print_json(&control.approve(opts.request(id, to)).await?)?;
        }
        Commands::MonarchOk { id, to, opts } => {
            print_json(&control.monarch_ok(opts.request(id, to)).await?)?;
        }
        Commands::MonarchReply { id, reply, actor } => {
            let request = MoveRequest::new(id, "").with_actor(actor);
            let (moved, accepted) = control.monarch_reply(request, &reply).await?;
            print_json(&moved)?;
            report_run(accepted).await?;
        }
        Commands::Board => {
            print_json(&control.board().await?)?;
        }
        Commands::Sync { file, actor } => {
            let columns = read_layout(&file)?;
            print_json(&control.replace_columns(columns, &actor).await?)?;
        }
        Commands::Telemetry => {
            print_json(&control.telemetry().await?)?;
        }
    }

    Ok(())
}

/// Print the acknowledgment, then wait for the worker: it is owned by this
/// process and would die with it.
async fn report_run(accepted: RunAccepted) -> Result<()> {
    print_json(&serde_json::json!({
        "queued": accepted.queued,
        "sessionId": accepted.session_id,
        "overridden": accepted.overridden,
        "jobId": accepted.handle.id,
    }))?;

    let report = accepted.handle.wait().await??;
    info!("Run {} finished as {}", report.session_id, report.status);
    print_json(&serde_json::json!({
        "missionId": report.mission_id,
        "sessionId": report.session_id,
        "status": report.status,
        "criterionC": report.criterion.holds,
        "detail": report.criterion.detail,
        "evidence": report.evidence,
        "relocated": report.relocated,
    }))
}

fn read_layout(file: &Path) -> Result<Vec<Column>> {
    let text = if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read layout {}", file.display()))?
    };
    parse_layout(&text)
}

/// Accepts either a bare column array or a whole board document.
fn parse_layout(text: &str) -> Result<Vec<Column>> {
    if let Ok(columns) = serde_json::from_str::<Vec<Column>>(text) {
        return Ok(columns);
    }
    let board: Board = serde_json::from_str(text).context("Layout is not a board or column list")?;
    Ok(board.columns)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
