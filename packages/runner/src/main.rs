//! Operator binary for batch alpha simulation.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use brain::{BrainConfig, BrainCredentials, BrainSubmitter};
use clap::{Parser, Subcommand};
use db::{AlphaRepository, DbConfig};
use engine::{
    BatchDispatcher, BatchRun, BatchRunner, EngineConfig, EngineError, ProgressReporter,
    RetryController, SessionHandle,
};
use sim_core::{AlphaStatus, BatchId, CredentialProvider, JobStore, SimulationEvent};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod jobs;

#[derive(Debug, Parser)]
#[command(name = "alpha-runner", about = "Submit alpha simulations in batches")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store the alphas of a job file in a new batch and simulate them.
    Run {
        /// JSON array of alpha specs or bare expressions.
        jobs: PathBuf,
    },
    /// Collect pending or failed alphas into a new batch and simulate them.
    Rerun {
        /// `pending` or `failed`.
        status: AlphaStatus,
    },
    /// Print batch statistics.
    Progress {
        /// Only this batch.
        #[arg(long)]
        batch: Option<String>,
    },
    /// Detach pending alphas from stale batches.
    Clean,
    /// Submit a simulated alpha for review.
    SubmitAlpha {
        /// Alpha id assigned by the service.
        alpha_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let db_config = DbConfig::from_env()?;
    if db_config.is_ephemeral() {
        tracing::warn!("Using an in-memory database; records are lost on exit");
    }
    let store = Arc::new(AlphaRepository::new(db::init(db_config).await?));

    match cli.command {
        Command::Run { jobs } => {
            let specs = jobs::load_jobs(&jobs).await?;
            let runner = build_runner(Arc::clone(&store)).await?;
            let run = runner.run_new_batch(&specs).await?;
            log_run(&run);
        }
        Command::Rerun { status } => {
            if status == AlphaStatus::Success {
                return Err(EngineError::InvalidRerunStatus(status).into());
            }
            let runner = build_runner(Arc::clone(&store)).await?;
            let run = runner.rerun_by_status(status).await?;
            log_run(&run);
        }
        Command::Progress { batch } => {
            let reporter = ProgressReporter::new(Arc::clone(&store));
            match batch {
                Some(batch) => {
                    reporter.log_batch(&BatchId::new(batch)).await?;
                }
                None => {
                    let reports = reporter.log_all().await?;
                    if reports.is_empty() {
                        tracing::info!("No alphas stored yet");
                    }
                }
            }
        }
        Command::Clean => {
            let cleaned = store.clean_pending().await?;
            tracing::info!(cleaned, "Pending alphas detached from their batches");
        }
        Command::SubmitAlpha { alpha_id } => {
            let provider = BrainCredentials::new(BrainConfig::from_env()?)?;
            let session = provider.get_session().await?;
            let response = BrainSubmitter::new().submit_alpha(&session, &alpha_id).await?;
            tracing::info!(alpha_id = %alpha_id, "Submission response: {}", response);
        }
    }

    Ok(())
}

/// Log in and wire the engine. A failed first login aborts startup.
async fn build_runner(
    store: Arc<AlphaRepository>,
) -> Result<BatchRunner<AlphaRepository>, Box<dyn Error>> {
    let engine_config = EngineConfig::from_env()?;
    let provider = BrainCredentials::new(BrainConfig::from_env()?)?;
    let session = Arc::new(SessionHandle::connect(provider).await?);

    let controller = RetryController::new(
        session,
        BrainSubmitter::new(),
        Arc::clone(&store),
        engine_config.retry,
    );

    let (event_tx, event_rx) = broadcast::channel(1024);
    tokio::spawn(log_events(event_rx));

    let dispatcher =
        BatchDispatcher::new(Arc::new(controller), engine_config.dispatch).with_event_tx(event_tx);

    Ok(BatchRunner::new(store, dispatcher))
}

async fn log_events(mut rx: broadcast::Receiver<SimulationEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => tracing::debug!(
                fingerprint = event.fingerprint().unwrap_or("-"),
                at = %event.timestamp(),
                "{}",
                event.description()
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn log_run(run: &BatchRun) {
    tracing::info!(
        batch_id = %run.batch_id,
        inserted = run.inserted,
        dispatched = run.dispatched,
        succeeded = run.summary.succeeded,
        failed = run.summary.failed,
        panicked = run.summary.panicked,
        skipped = run.summary.skipped,
        "Run complete"
    );
    if let Some(rate) = run.stats.success_rate() {
        tracing::info!(batch_id = %run.batch_id, "Success rate: {:.2}%", rate);
    }
}
