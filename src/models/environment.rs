use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A project environment: where a project's services run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub uid: String,
    pub project_name: String,
    pub env_name: String,
    pub namespace: String,
    /// Empty for the local cluster.
    pub cluster_id: String,
    pub creation_timestamp: DateTime<Utc>,
}

impl Environment {
    pub fn new(project_name: String, env_name: String, namespace: String) -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            project_name,
            env_name,
            namespace,
            cluster_id: String::new(),
            creation_timestamp: Utc::now(),
        }
    }

    pub fn with_cluster(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = cluster_id.into();
        self
    }
}
