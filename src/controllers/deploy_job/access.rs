use std::sync::Arc;
use tracing::info;

use super::DeployError;
use crate::cluster::{ClusterClient, ClusterClientFactory, EnvironmentStore};

/// Where a job's environment lives and a client to reach it.
pub(super) struct ClusterAccess {
    pub namespace: String,
    /// Empty for the local cluster.
    pub cluster_id: String,
    pub client: Arc<dyn ClusterClient>,
}

pub(super) async fn resolve(
    environments: &dyn EnvironmentStore,
    clusters: &dyn ClusterClientFactory,
    project_name: &str,
    env_name: &str,
) -> Result<ClusterAccess, DeployError> {
    let env = environments
        .find(project_name, env_name)
        .await
        .map_err(DeployError::Environment)?;

    let cluster_id = (!env.cluster_id.is_empty()).then_some(env.cluster_id.as_str());
    let client = clusters.client(cluster_id).await.map_err(DeployError::Client)?;

    info!(
        "Resolved env {}/{} to namespace {} on cluster {}",
        project_name,
        env_name,
        env.namespace,
        cluster_id.unwrap_or("local")
    );

    Ok(ClusterAccess {
        namespace: env.namespace,
        cluster_id: env.cluster_id,
        client,
    })
}
