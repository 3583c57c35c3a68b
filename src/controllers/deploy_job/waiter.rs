use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::cluster::diagnostics::pod_error_messages;
use crate::cluster::readiness::{deployment_ready, stateful_set_ready};
use crate::cluster::ClusterClient;
use crate::models::{LabelSelector, ReplaceResource, WorkloadKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum WaitOutcome {
    Passed,
    Failed(String),
    Timeout,
    Cancelled,
}

/// Polls the patched workloads until they are all ready.
///
/// Each round checks, in order: cancellation, then the deadline, then sleeps
/// one poll interval (cut short at the deadline) and checks readiness.
/// Cancellation wins over everything else, including a poll that just
/// reported ready and the diagnostics taken at the deadline.
pub(super) struct ReadinessWaiter<'a> {
    pub client: &'a dyn ClusterClient,
    pub namespace: &'a str,
    /// Selects the service's pods for the deadline diagnostics.
    pub selector: &'a LabelSelector,
    pub resources: &'a [ReplaceResource],
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl ReadinessWaiter<'_> {
    pub async fn wait(&self, cancel: &CancellationToken) -> WaitOutcome {
        let deadline = Instant::now() + self.timeout;

        loop {
            if cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }

            if Instant::now() >= deadline {
                let outcome = self.diagnose().await;
                if cancel.is_cancelled() {
                    return WaitOutcome::Cancelled;
                }
                return outcome;
            }

            // Never sleep past the deadline, and never poll once it is reached.
            let wake = deadline.min(Instant::now() + self.poll_interval);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => continue,
                _ = sleep_until(wake) => {}
            }
            if Instant::now() >= deadline {
                continue;
            }

            let ready = self.all_ready().await;
            if cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            if ready {
                return WaitOutcome::Passed;
            }
        }
    }

    /// Checks ledger entries in order and stops at the first one that is not
    /// ready or could not be read.
    async fn all_ready(&self) -> bool {
        for resource in self.resources {
            if !self.resource_ready(resource).await {
                debug!(
                    "{}/{}/{} is not ready yet",
                    self.namespace,
                    resource.kind.resource(),
                    resource.name
                );
                return false;
            }
        }
        true
    }

    async fn resource_ready(&self, resource: &ReplaceResource) -> bool {
        let ready = match resource.kind {
            WorkloadKind::Deployment => self
                .client
                .get_deployment(self.namespace, &resource.name)
                .await
                .map(|d| d.as_ref().map(deployment_ready)),
            WorkloadKind::StatefulSet => self
                .client
                .get_stateful_set(self.namespace, &resource.name)
                .await
                .map(|s| s.as_ref().map(stateful_set_ready)),
        };

        match ready {
            Ok(Some(ready)) => ready,
            Ok(None) => {
                warn!(
                    "failed to check {} ready status {}/{}: not found",
                    resource.kind, self.namespace, resource.name
                );
                false
            }
            Err(e) => {
                warn!(
                    "failed to check {} ready status {}/{}: {}",
                    resource.kind, self.namespace, resource.name, e
                );
                false
            }
        }
    }

    /// Decides between failed and timeout once the deadline has passed:
    /// failing pods of the service turn the job into a failure carrying their
    /// container messages.
    async fn diagnose(&self) -> WaitOutcome {
        let pods = match self.client.list_pods(self.namespace, self.selector).await {
            Ok(pods) => pods,
            Err(e) => {
                let msg = format!("list pods error: {}", e);
                error!("{}", msg);
                return WaitOutcome::Failed(msg);
            }
        };

        let messages = pod_error_messages(&pods);
        if messages.is_empty() {
            warn!("Timed out waiting for {} in {}", self.selector, self.namespace);
            WaitOutcome::Timeout
        } else {
            WaitOutcome::Failed(messages.join("\n"))
        }
    }
}
