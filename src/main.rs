mod cli;
mod config;
mod dispatcher;
mod error;
mod orchestrator;
mod planner;
mod poller;
mod server;
mod stage;
mod state_machine;
mod store;
#[cfg(test)]
mod testing;
mod ui;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::Style;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::ConductorConfig;
use dispatcher::Dispatcher;
use orchestrator::ChainRunner;
use planner::TrackRequest;
use poller::{ClientError, OrchestratorClient, exit_status, poll_until_terminal};
use server::AppState;
use stage::HttpStageInvoker;
use store::InMemoryJobStore;
use ui::JobProgress;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", Style::new().red().bold().apply_to("error:"));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "conductor=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = ConductorConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.orchestrator_url = url;
    }

    match cli.command {
        Command::Serve => {
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Create { prompt, reference } => {
            let client = OrchestratorClient::new(&config.orchestrator_url);
            let job_id = client
                .create_job(&TrackRequest::new(prompt, reference))
                .await?;
            println!("Job created with ID: {job_id}");
            watch(&client, &job_id, &config).await
        }
        Command::Status { job_id } => {
            let client = OrchestratorClient::new(&config.orchestrator_url);
            let snapshot = client.get_status(&job_id).await?;
            ui::print_snapshot(&snapshot);
            Ok(ExitCode::SUCCESS)
        }
        Command::Watch { job_id } => {
            let client = OrchestratorClient::new(&config.orchestrator_url);
            watch(&client, &job_id, &config).await
        }
    }
}

async fn serve(config: ConductorConfig) -> Result<()> {
    let store = Arc::new(InMemoryJobStore::new());
    let invoker = Arc::new(HttpStageInvoker::new()?);
    let runner = Arc::new(ChainRunner::new(store.clone(), invoker));
    let dispatcher = Dispatcher::new(runner, config.workers);
    let state = Arc::new(AppState::new(store, dispatcher, config.stages.clone()));

    server::run_server(state, &config.bind).await
}

async fn watch(
    client: &OrchestratorClient,
    job_id: &str,
    config: &ConductorConfig,
) -> Result<ExitCode> {
    let progress = JobProgress::start(job_id);
    let result = poll_until_terminal(client, job_id, config.poll_interval(), &progress).await;
    match &result {
        Ok(outcome) => progress.complete(outcome),
        Err(ClientError::NotFound(id)) => progress.abandon(&format!(
            "Job {id} not found. Records do not survive an orchestrator restart."
        )),
        Err(e) => progress.abandon(&e.to_string()),
    }
    Ok(ExitCode::from(exit_status(&result)))
}
