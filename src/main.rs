use anyhow::{bail, Context, Result};
use clap::Parser;
use krust_deploy::{
    cluster::ClusterRegistry,
    config::{ControllerConfig, DEFAULT_DEPLOY_TIMEOUT_SECS, PRODUCT_LABEL, SERVICE_LABEL},
    controllers::{DeployJobController, JobContext},
    models::{DeploySpec, JobStatus, JobTask},
    Storage,
};
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run a single deploy job against the local cluster database.
#[derive(Debug, Parser)]
#[command(name = "krust-deploy", version)]
struct Args {
    /// Job descriptor: `{"name": ..., "spec": {...}}`.
    #[arg(long)]
    job: PathBuf,

    #[arg(long, env = "KRUST_DEPLOY_DATABASE_URL", default_value = "sqlite:krust.db?mode=rwc")]
    database_url: String,

    #[arg(long, env = "KRUST_DEPLOY_POLL_INTERVAL_SECS", default_value_t = 2)]
    poll_interval_secs: u64,

    #[arg(long, env = "KRUST_DEPLOY_DEFAULT_TIMEOUT_SECS", default_value_t = DEFAULT_DEPLOY_TIMEOUT_SECS)]
    default_timeout_secs: u64,

    #[arg(long, default_value = PRODUCT_LABEL)]
    product_label: String,

    #[arg(long, default_value = SERVICE_LABEL)]
    service_label: String,
}

#[derive(Debug, Deserialize)]
struct JobDescriptor {
    name: String,
    spec: DeploySpec,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "krust_deploy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let raw = tokio::fs::read_to_string(&args.job)
        .await
        .with_context(|| format!("reading job descriptor {}", args.job.display()))?;
    let descriptor: JobDescriptor = serde_json::from_str(&raw).context("parsing job descriptor")?;

    let storage = Storage::new(&args.database_url).await?;
    tracing::info!("Running database migrations");
    storage.migrate().await?;

    let config = ControllerConfig {
        poll_interval: Duration::from_secs(args.poll_interval_secs),
        default_timeout_secs: args.default_timeout_secs,
        product_label: args.product_label,
        service_label: args.service_label,
    };
    let ctx = JobContext {
        environments: Arc::new(storage.clone()),
        services: Arc::new(storage.clone()),
        clusters: Arc::new(ClusterRegistry::new(Arc::new(storage.clone()))),
    };

    let job = JobTask::new(descriptor.name, descriptor.spec);
    storage.jobs().save(&job).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling deploy job");
            on_signal.cancel();
        }
    });

    let ack = Box::new(|job: &JobTask| {
        tracing::info!("Job {} status: {}", job.name, job.status);
    });
    let mut controller = DeployJobController::new(job, ctx, config, ack);
    let status = controller.run(&cancel).await;

    let job = controller.into_job();
    storage.jobs().save(&job).await?;

    if status != JobStatus::Passed {
        bail!("deploy job {} ended as {}: {}", job.name, status, job.error);
    }
    tracing::info!("Deploy job {} passed", job.name);
    Ok(())
}
