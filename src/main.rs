use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;

use triage_core::config::{self, TriagePolicy};
use triage_core::db::SqlitePersistence;
use triage_core::events::EventStore;
use triage_core::patients::PatientRegistry;
use triage_core::protocols::ProtocolRepository;
use triage_core::tasks::TaskQueue;
use triage_core::tools::{ToolCall, ToolError, ToolResponse, TriageCore};

/// Line-oriented tool console: one JSON tool call per stdin line,
/// one JSON response per stdout line.
#[derive(Parser)]
#[command(name = "triage-console", version, about = "Symptom triage tool console")]
struct Cli {
    /// SQLite database backing the event log and task queue
    #[arg(long)]
    db: Option<PathBuf>,

    /// Keep everything in memory (nothing survives the process)
    #[arg(long, conflicts_with = "db")]
    in_memory: bool,

    /// JSON file with escalation protocols
    #[arg(long)]
    protocols: Option<PathBuf>,

    /// JSON file with patient profiles
    #[arg(long)]
    patients: Option<PathBuf>,

    /// JSON file overriding the default triage policy
    #[arg(long)]
    policy: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    triage_core::init_logging();

    let mut core = match build_core(&cli) {
        Ok(core) => core,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("triage-console: {e}");
            return ExitCode::FAILURE;
        }
    };

    match serve(&mut core) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Console I/O failed");
            ExitCode::FAILURE
        }
    }
}

fn build_core(cli: &Cli) -> Result<TriageCore, Box<dyn std::error::Error>> {
    let policy = match &cli.policy {
        Some(path) => TriagePolicy::load(path)?,
        None => TriagePolicy::default(),
    };
    let protocols = match &cli.protocols {
        Some(path) => ProtocolRepository::load(path)?,
        None => ProtocolRepository::default(),
    };
    let patients = match &cli.patients {
        Some(path) => PatientRegistry::load(path)?,
        None => PatientRegistry::new(),
    };

    if cli.in_memory {
        let mut core = TriageCore::in_memory(policy);
        core.protocols = protocols;
        core.patients = patients;
        return Ok(core);
    }

    let path = cli.db.clone().unwrap_or_else(config::default_database_path);
    tracing::info!(path = %path.display(), "Opening database");
    let backend = Rc::new(SqlitePersistence::open(&path)?);
    let store = EventStore::open(Box::new(Rc::clone(&backend)))?;
    let queue = TaskQueue::open(Box::new(backend))?;

    Ok(TriageCore::new(policy, protocols, patients, store, queue))
}

fn serve(core: &mut TriageCore) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ToolCall>(&line) {
            Ok(call) => core.dispatch(&call),
            Err(e) => ToolResponse::failure(&ToolError::from(e)),
        };

        let json = serde_json::to_string(&response)?;
        writeln!(stdout, "{json}")?;
        stdout.flush()?;
    }
    Ok(())
}
