mod archive;
mod cli;
mod config;
mod control;
mod error;
mod events;
mod hil;
mod job;
mod messages;
mod orchestrator;
mod polling;
mod project;
mod refresher;
mod remote;
mod stages;
#[cfg(test)]
mod testing;
mod ui;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Command};
use config::TransformConfig;
use control::JobControl;
use events::{EventSink, JobEvent};
use hil::MavenVersionsTool;
use job::{TransformRequest, TransformationType};
use orchestrator::Orchestrator;
use remote::{RemoteClient, TransformService};
use ui::JobProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("transform=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => TransformConfig::load_from(path)?,
        None => TransformConfig::load()?,
    };

    match cli.command {
        Command::Run {
            project,
            target,
            source,
            sql,
            build_command,
        } => {
            let request = TransformRequest {
                project_path: project,
                transformation_type: cli::transformation_type(sql),
                source_version: source,
                target_version: target,
                build_command,
            };
            run_transformation(config, request).await
        }
        Command::Stop { job_id } => {
            let control = JobControl::detached(Arc::new(client(&config)?));
            control
                .stop(&job_id)
                .await
                .with_context(|| format!("stopping job {job_id}"))?;
            println!("Stop requested for job {job_id}");
            Ok(())
        }
        Command::Status { job_id } => {
            let client = client(&config)?;
            let report = client
                .get_status(&job_id)
                .await
                .with_context(|| format!("querying job {job_id}"))?;
            println!("{job_id}: {}", report.status);
            if let Some(reason) = report.reason {
                println!("  {reason}");
            }
            Ok(())
        }
        Command::Projects { root } => {
            let projects = project::discover_projects(&root)?;
            if projects.is_empty() {
                println!("No Maven projects under {}", root.display());
            }
            for path in projects {
                let eligible =
                    project::validate_project(&path, TransformationType::LanguageUpgrade).is_ok();
                let mark = if eligible { "✓" } else { "·" };
                println!("  {mark} {}", path.display());
            }
            Ok(())
        }
    }
}

fn client(config: &TransformConfig) -> Result<RemoteClient> {
    RemoteClient::new(&config.endpoint, &config.api_token)
        .with_context(|| format!("building client for {}", config.endpoint))
}

async fn run_transformation(config: TransformConfig, request: TransformRequest) -> Result<()> {
    if let Err(e) = project::validate_project(&request.project_path, request.transformation_type)
    {
        ui::print_error(&e.to_string());
        return Err(e.into());
    }

    let service = Arc::new(client(&config)?);
    let tool = MavenVersionsTool::new(config.dependency_tool.clone());
    let (events, mut rx) = EventSink::channel();
    let mut orchestrator = Orchestrator::new(service, tool, config, events);

    let ui_control = orchestrator.control();
    let label = display_name(&request.project_path);
    let ui_task = tokio::spawn(async move {
        let progress = JobProgress::start(&label);
        while let Some(event) = rx.recv().await {
            if let Some(prompt) = progress.handle(&event) {
                let asking = progress.clone();
                let answer = tokio::task::spawn_blocking(move || asking.prompt_choice(&prompt));
                let cancelled = ui_control.cancellation();
                // The abandoned read keeps the spinner suspended, so rendering
                // stops here and the summary below reports the outcome.
                let answer = tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    answer = answer => answer.ok().flatten(),
                };
                let sent = match answer {
                    Some(version) => ui_control.submit_user_dependency_choice(version),
                    None => ui_control.decline_dependency_choice(),
                };
                if sent.is_err() {
                    break;
                }
            }
            if matches!(event, JobEvent::CleanedUp) {
                break;
            }
        }
    });

    let interrupt_control = orchestrator.control();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling transformation");
            interrupt_control.cancel();
        }
    });

    let summary = orchestrator.run(request).await;
    interrupt.abort();
    drop(orchestrator);
    let _ = ui_task.await;

    let summary = summary?;
    info!(job_id = %summary.job_id, outcome = ?summary.outcome, "run complete");
    ui::print_summary(&summary);
    if !summary.outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
