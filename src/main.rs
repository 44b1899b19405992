// seo-audit: run one SEO audit from the command line
//
// Submits a URL, polls the job until it is terminal and prints the full
// job record as JSON. Ctrl-C cancels the job and shuts the browser down.
//
//   seo-audit <url> [--store <path>] [--prompt <id>]...

use anyhow::Result;
use clap::Parser;
use seo_audit::{AuditConfig, AuditService, Job, JobStatus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "seo-audit", about = "Run one SEO audit and print the job as JSON")]
struct Args {
    /// Page to audit (absolute http or https URL)
    url: String,

    /// JSON file to persist jobs in; overrides SEO_AUDIT_STORE
    #[arg(long)]
    store: Option<PathBuf>,

    /// Catalog prompt id to run; repeat for several, omit for the defaults
    #[arg(long = "prompt", value_name = "ID")]
    prompts: Vec<String>,
}

async fn wait_for_terminal(service: &AuditService, id: &str) -> Result<Job> {
    let mut last_status = JobStatus::Pending;
    loop {
        let status = service.get_status(id).await?;
        if status.status != last_status {
            info!(
                job_id = %id,
                status = %status.status,
                progress = status.progress,
                "Job status"
            );
            last_status = status.status;
        }
        if status.status.is_terminal() {
            return Ok(service.get_result(id).await?);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chromiumoxide=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = AuditConfig::from_env()?;
    if args.store.is_some() {
        config.jobs.store_path = args.store;
    }
    if !config.has_api_key() {
        warn!("No API key configured; analysis will fall back to heuristic scores");
    }

    let service = Arc::new(AuditService::from_config(config).await?);
    let cleanup = service.clone().start_cleanup_task();

    let job = service.submit_with_prompts(&args.url, args.prompts).await?;
    let id = job.id.to_string();
    info!(job_id = %id, url = %job.url, "Submitted");

    let finished = tokio::select! {
        result = wait_for_terminal(&service, &id) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!(job_id = %id, "Interrupted, cancelling job");
            service.cancel(&id).await?;
            wait_for_terminal(&service, &id).await
        }
    };

    service.shutdown().await;
    if let Err(e) = cleanup.await {
        warn!("Cleanup task ended abnormally: {e}");
    }

    let job = finished?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    if job.status != JobStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}
