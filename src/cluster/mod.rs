pub mod diagnostics;
pub mod readiness;
pub mod registry;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Environment, LabelSelector, ServiceFindOptions, ServiceInfo, WorkloadKind};

pub use registry::ClusterRegistry;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("{kind} name is required")]
    MissingName { kind: &'static str },

    #[error("container {container} not found in {namespace}/{resource}/{name}")]
    ContainerNotFound {
        resource: &'static str,
        namespace: String,
        name: String,
        container: String,
    },

    #[error("can't connect to cluster {0}")]
    UnknownCluster(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("invalid object: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid patch: {0}")]
    Patch(#[from] json_patch::PatchError),

    /// Failure reported by a cluster's API server.
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("invalid record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read/update access to workload and pod objects in one cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Deployment>, ClusterError>;

    async fn list_stateful_sets(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<StatefulSet>, ClusterError>;

    /// `Ok(None)` when the deployment does not exist.
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError>;

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>, ClusterError>;

    async fn update_container_image(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        container: &str,
        image: &str,
    ) -> Result<(), ClusterError>;

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>, ClusterError>;
}

/// Hands out a client for a cluster id; `None` is the local cluster.
#[async_trait]
pub trait ClusterClientFactory: Send + Sync {
    async fn client(&self, cluster_id: Option<&str>) -> Result<Arc<dyn ClusterClient>, ClusterError>;
}

#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    async fn find(&self, project_name: &str, env_name: &str) -> Result<Environment, StoreError>;
}

#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn find(&self, opts: &ServiceFindOptions) -> Result<ServiceInfo, StoreError>;
}
