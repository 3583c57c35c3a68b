//! Deploy job: point a service's workload at a new image and wait for the
//! rollout to finish.
//!
//! A run goes through three stages: resolve the workload, patch its image,
//! then wait for it to become ready. Any stage failure ends the job as
//! `failed`. Every outcome, including errors, lands on the job record as a
//! terminal status plus message.

mod access;
mod patcher;
mod resolver;
mod waiter;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cluster::{ClusterClientFactory, ClusterError, EnvironmentStore, ServiceRegistry, StoreError};
use crate::config::ControllerConfig;
use crate::models::{JobStatus, JobTask};

pub use resolver::WorkloadTarget;

use self::access::ClusterAccess;
use self::waiter::{ReadinessWaiter, WaitOutcome};

/// Called whenever the job's status or spec changes.
pub type Ack = Box<dyn Fn(&JobTask) + Send + Sync>;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("find project error: {0}")]
    Environment(#[source] StoreError),

    #[error("can't init k8s client: {0}")]
    Client(#[source] ClusterError),

    #[error("find service {service} error: {source}")]
    Service { service: String, source: StoreError },

    #[error("failed to list {resource} in {namespace}: {source}")]
    List {
        resource: &'static str,
        namespace: String,
        source: ClusterError,
    },

    #[error("failed to get {resource} {namespace}/{name}: {source}")]
    Lookup {
        resource: &'static str,
        namespace: String,
        name: String,
        source: ClusterError,
    },

    #[error("service {service} container name {container} is not found in env {env}")]
    ContainerNotFound {
        service: String,
        container: String,
        env: String,
    },

    #[error("failed to update container image in {namespace}/{resource}/{name}/{container}: {source}")]
    Patch {
        resource: &'static str,
        namespace: String,
        name: String,
        container: String,
        source: ClusterError,
    },
}

/// The collaborators a deploy job talks to.
#[derive(Clone)]
pub struct JobContext {
    pub environments: Arc<dyn EnvironmentStore>,
    pub services: Arc<dyn ServiceRegistry>,
    pub clusters: Arc<dyn ClusterClientFactory>,
}

pub struct DeployJobController {
    job: JobTask,
    ctx: JobContext,
    config: ControllerConfig,
    ack: Ack,
}

impl DeployJobController {
    pub fn new(job: JobTask, ctx: JobContext, config: ControllerConfig, ack: Ack) -> Self {
        Self { job, ctx, config, ack }
    }

    pub fn job(&self) -> &JobTask {
        &self.job
    }

    pub fn into_job(self) -> JobTask {
        self.job
    }

    /// Runs the job to completion and returns its terminal status.
    pub async fn run(&mut self, cancel: &CancellationToken) -> JobStatus {
        info!(
            "Starting deploy job {} for service {} in env {}",
            self.job.name, self.job.spec.service_name, self.job.spec.env
        );

        let access = match self.deploy().await {
            Ok(access) => access,
            Err(e) => {
                self.fail(e.to_string());
                return self.job.status;
            }
        };

        if self.job.spec.skip_check_run_status {
            self.finish(JobStatus::Passed, "");
            return self.job.status;
        }

        self.wait(&access, cancel).await;
        self.job.status
    }

    /// Resolves and patches the target workloads. On success the ledger is
    /// non-empty and the job record carries the updated spec.
    async fn deploy(&mut self) -> Result<ClusterAccess, DeployError> {
        let access = access::resolve(
            self.ctx.environments.as_ref(),
            self.ctx.clusters.as_ref(),
            &self.job.spec.project_name,
            &self.job.spec.env,
        )
        .await?;
        self.job.spec.cluster_id = access.cluster_id.clone();

        let service = resolver::find_service(self.ctx.services.as_ref(), &self.job.spec).await?;
        if let Some(kind) = service.workload_type {
            self.job.spec.workload_kind = Some(kind);
        }

        let selector = self
            .config
            .service_selector(&self.job.spec.project_name, &self.job.spec.service_name);
        let targets =
            resolver::resolve_targets(access.client.as_ref(), &access.namespace, &selector, &self.job.spec).await?;

        let spec = &mut self.job.spec;
        patcher::patch_images(
            access.client.as_ref(),
            &access.namespace,
            &targets,
            &spec.image,
            &mut spec.replace_resources,
        )
        .await?;

        (self.ack)(&self.job);
        Ok(access)
    }

    async fn wait(&mut self, access: &ClusterAccess, cancel: &CancellationToken) {
        let timeout = Duration::from_secs(self.timeout());
        let selector = self
            .config
            .service_selector(&self.job.spec.project_name, &self.job.spec.service_name);

        let waiter = ReadinessWaiter {
            client: access.client.as_ref(),
            namespace: &access.namespace,
            selector: &selector,
            resources: &self.job.spec.replace_resources,
            poll_interval: self.config.poll_interval,
            timeout,
        };

        match waiter.wait(cancel).await {
            WaitOutcome::Passed => self.finish(JobStatus::Passed, ""),
            WaitOutcome::Failed(msg) => self.fail(msg),
            WaitOutcome::Timeout => self.finish(JobStatus::Timeout, ""),
            WaitOutcome::Cancelled => self.finish(JobStatus::Cancelled, ""),
        }
    }

    /// Job timeout in seconds; an unset timeout is replaced by the default.
    fn timeout(&mut self) -> u64 {
        if self.job.spec.timeout == 0 {
            self.job.spec.timeout = self.config.default_timeout_secs;
        }
        self.job.spec.timeout
    }

    fn fail(&mut self, msg: String) {
        error!("Deploy job {} failed: {}", self.job.name, msg);
        self.finish(JobStatus::Failed, msg);
    }

    fn finish(&mut self, status: JobStatus, msg: impl Into<String>) {
        if self.job.finish(status, msg) {
            info!("Deploy job {} finished with status {}", self.job.name, status);
            (self.ack)(&self.job);
        } else {
            warn!(
                "Deploy job {} already finished as {}, ignoring {}",
                self.job.name, self.job.status, status
            );
        }
    }
}
