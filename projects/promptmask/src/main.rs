mod cli;
mod error;
mod jobs;
mod pipeline;
mod web;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use cli::Args;
use jobs::registry::JobRegistry;
use jobs::scheduler::JobScheduler;
use pipeline::executor::PipelineStages;
use web::server::run_server;
use web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();

    fs::create_dir_all(&args.upload_root)
        .with_context(|| format!("Failed to create upload root: {:?}", args.upload_root))?;
    fs::create_dir_all(&args.results_root)
        .with_context(|| format!("Failed to create results root: {:?}", args.results_root))?;

    let registry = Arc::new(JobRegistry::new());
    let stages = Arc::new(PipelineStages::from_args(&args));
    let scheduler = Arc::new(JobScheduler::new(
        registry.clone(),
        stages,
        args.upload_root.clone(),
        args.results_root.clone(),
        args.max_concurrent_jobs,
    ));

    let state = Arc::new(AppState {
        registry,
        scheduler,
    });

    run_server(args.host, args.port, state).await?;

    Ok(())
}
