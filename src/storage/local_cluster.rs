use async_trait::async_trait;
use json_patch::Patch;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Container, Pod};
use serde_json::json;
use tracing::info;

use super::Storage;
use crate::cluster::{ClusterClient, ClusterError};
use crate::models::{LabelSelector, WorkloadKind};

// The local cluster: workloads and pods stored in this process's database.
#[async_trait]
impl ClusterClient for Storage {
    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Deployment>, ClusterError> {
        self.deployments().list(namespace, selector).await
    }

    async fn list_stateful_sets(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<StatefulSet>, ClusterError> {
        self.statefulsets().list(namespace, selector).await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError> {
        self.deployments().get(namespace, name).await
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>, ClusterError> {
        self.statefulsets().get(namespace, name).await
    }

    async fn update_container_image(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        container: &str,
        image: &str,
    ) -> Result<(), ClusterError> {
        let not_found = || ClusterError::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        };

        let index = match kind {
            WorkloadKind::Deployment => {
                let deployment = self.deployments().get(namespace, name).await?.ok_or_else(not_found)?;
                let containers = deployment
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.template.spec.as_ref())
                    .map(|pod| pod.containers.as_slice());
                container_index(containers, container)
            }
            WorkloadKind::StatefulSet => {
                let stateful_set = self.statefulsets().get(namespace, name).await?.ok_or_else(not_found)?;
                let containers = stateful_set
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.template.spec.as_ref())
                    .map(|pod| pod.containers.as_slice());
                container_index(containers, container)
            }
        }
        .ok_or_else(|| ClusterError::ContainerNotFound {
            resource: kind.resource(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            container: container.to_string(),
        })?;

        let patch: Patch = serde_json::from_value(json!([{
            "op": "replace",
            "path": format!("/spec/template/spec/containers/{}/image", index),
            "value": image,
        }]))?;

        match kind {
            WorkloadKind::Deployment => {
                self.deployments().patch(namespace, name, &patch).await?;
            }
            WorkloadKind::StatefulSet => {
                self.statefulsets().patch(namespace, name, &patch).await?;
            }
        }

        info!("Updated {}/{}/{} container {} to image {}", namespace, kind.resource(), name, container, image);
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>, ClusterError> {
        self.pods().list(namespace, selector).await
    }
}

fn container_index(containers: Option<&[Container]>, name: &str) -> Option<usize> {
    containers?.iter().position(|c| c.name == name)
}
