//! veritas — doctrinal audit runner
//!
//! Usage:
//!   veritas run --seeds ./seeds        → one audit cycle per seed case
//!   veritas agents                     → list the registered agents
//!   veritas protocols                  → list the protocol registry
//!   veritas config --dump              → print the default config as TOML

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use veritas::seeds;
use veritas_agent::{standard_registry, AuditCycle, CycleReport, VeritasConfig};
use veritas_core::{Error, ProtocolRegistry};
use veritas_doctrine::DoctrineLibrary;
use veritas_ledger::{JsonlSink, LedgerMetrics, LedgerSink, MemoryLedger, NullSink};

#[derive(Parser)]
#[command(
    name = "veritas",
    about = "Doctrinal audit of agent outcomes",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML). Falls back to $VERITAS_CONFIG, then the user config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one audit cycle per seed case
    Run {
        /// Directory searched recursively for *.json case files
        #[arg(long, default_value = "seeds")]
        seeds: PathBuf,
        /// JSONL ledger file (overrides [ledger] path)
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
    /// List the registered agents
    Agents,
    /// List the protocol registry
    Protocols,
    /// Show the effective config
    Config {
        /// Print defaults instead of the loaded file
        #[arg(long)]
        dump: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("VERITAS_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Run { seeds, ledger } => {
            let config = VeritasConfig::load(&config_path);
            config.validate().context("invalid config")?;
            run(&config, &seeds, ledger).await?;
        }
        Commands::Agents => {
            for identity in standard_registry()?.identities() {
                let protocols: Vec<&str> = identity.protocols.iter().map(|p| p.name()).collect();
                println!(
                    "{:<4} {:<7} {:<10} {:<34} {}",
                    identity.id.as_str(),
                    identity.name,
                    identity.glyphs.join(""),
                    identity.domain,
                    protocols.join(", ")
                );
            }
        }
        Commands::Protocols => {
            for protocol in ProtocolRegistry::iter() {
                let note = if protocol.is_reentrant() { "  (re-entrant)" } else { "" };
                println!("{}{}", protocol, note);
            }
        }
        Commands::Config { dump } => {
            let config = if dump { VeritasConfig::default() } else { VeritasConfig::load(&config_path) };
            print!("{}", config.to_toml());
        }
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("veritas").join("veritas.toml"))
        .unwrap_or_else(|| PathBuf::from("veritas.toml"))
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("--log-file {} has no file name", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "veritas=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}

fn open_ledger(config: &VeritasConfig, path: Option<PathBuf>) -> MemoryLedger {
    let sink: Arc<dyn LedgerSink> = match path.or_else(|| config.ledger.path.clone()) {
        Some(path) => {
            info!("Ledger mirrored to {}", path.display());
            Arc::new(JsonlSink::new(path))
        }
        None => Arc::new(NullSink),
    };
    MemoryLedger::with_sink(sink, config.sink_timeout())
}

async fn run(config: &VeritasConfig, seeds_dir: &Path, ledger_path: Option<PathBuf>) -> anyhow::Result<()> {
    let seeds = seeds::load_cases(seeds_dir);
    for failure in &seeds.failures {
        eprintln!("skipped {}: {}", failure.path.display(), failure.error);
    }
    if seeds.is_empty() {
        warn!("No cases to audit under {}", seeds_dir.display());
    }

    let ledger = open_ledger(config, ledger_path);
    let library = Arc::new(DoctrineLibrary::standard());
    let cycle = AuditCycle::from_config(config, Arc::new(standard_registry()?), library.clone(), ledger.clone())?;

    let cancel = cycle.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling audit");
            cancel.cancel();
        }
    });

    let mut resolved = 0;
    for (path, case) in &seeds.cases {
        match cycle.run_case(case).await {
            Ok(report) => {
                resolved += report.total_resolved();
                print_report(&report);
            }
            Err(Error::Cancelled { completed }) => {
                error!(case = %case.id, completed, "audit cancelled");
                break;
            }
            Err(e) => {
                error!(case = %case.id, error = %e, "audit of {} failed", path.display());
            }
        }
    }

    let metrics = LedgerMetrics::calculate(&ledger.view(), resolved).await;
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    // teardown: flush the durable sink before exit
    ledger
        .close()
        .await
        .with_context(|| format!("ledger flush to {} failed", ledger.location()))?;
    info!(doctrine = %library.version().await, "audit run complete");
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!(
        "{:<10} {:<9} agents={} contradictions={} invoked={} failed={} resolved={}",
        report.case_id,
        report.state,
        report.runs.len(),
        report.contradictions().len(),
        report.invocations.len(),
        report.failures().len(),
        report.total_resolved()
    );
    for run in report.failures() {
        if let veritas_agent::AgentStatus::Failed { kind, message } = &run.status {
            println!("  {} failed ({}): {}", run.agent, kind, message);
        }
    }
    for invocation in &report.invocations {
        println!(
            "  {} -> {} ({})",
            invocation.contradiction.source_agent(),
            invocation.protocol,
            invocation.contradiction.summary()
        );
    }
}
