use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{ClusterClient, ClusterClientFactory, ClusterError};

/// Client factory backed by a fixed set of known clusters.
#[derive(Clone)]
pub struct ClusterRegistry {
    local: Arc<dyn ClusterClient>,
    clusters: HashMap<String, Arc<dyn ClusterClient>>,
}

impl ClusterRegistry {
    pub fn new(local: Arc<dyn ClusterClient>) -> Self {
        Self {
            local,
            clusters: HashMap::new(),
        }
    }

    pub fn register(mut self, cluster_id: impl Into<String>, client: Arc<dyn ClusterClient>) -> Self {
        self.clusters.insert(cluster_id.into(), client);
        self
    }
}

#[async_trait]
impl ClusterClientFactory for ClusterRegistry {
    async fn client(&self, cluster_id: Option<&str>) -> Result<Arc<dyn ClusterClient>, ClusterError> {
        match cluster_id {
            None | Some("") => Ok(self.local.clone()),
            Some(id) => {
                debug!(cluster = id, "resolving cluster client");
                self.clusters
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ClusterError::UnknownCluster(id.to_string()))
            }
        }
    }
}
