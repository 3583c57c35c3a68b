use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Container;
use tracing::{debug, info};

use super::DeployError;
use crate::cluster::{ClusterClient, ClusterError, ServiceRegistry, StoreError};
use crate::models::service::STATUS_DELETING;
use crate::models::{DeploySpec, LabelSelector, ServiceFindOptions, ServiceInfo, WorkloadKind};

/// A workload container selected for the new image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadTarget {
    pub kind: WorkloadKind,
    pub name: String,
    pub container: String,
    /// Image the container ran before the patch.
    pub current_image: String,
}

/// Looks the service up under the job's project first, then as a shared
/// service owned by no project.
pub(super) async fn find_service(
    services: &dyn ServiceRegistry,
    spec: &DeploySpec,
) -> Result<ServiceInfo, DeployError> {
    let mut opts = ServiceFindOptions {
        service_name: spec.service_name.clone(),
        project_name: Some(spec.project_name.clone()),
        exclude_status: Some(STATUS_DELETING.to_string()),
        service_type: spec.service_type.clone(),
    };

    match services.find(&opts).await {
        Ok(service) => Ok(service),
        Err(scoped) => {
            debug!(
                "Service {} not found in project {} ({}), trying shared services",
                spec.service_name, spec.project_name, scoped
            );
            opts.project_name = None;
            services.find(&opts).await.map_err(|source: StoreError| DeployError::Service {
                service: spec.service_name.clone(),
                source,
            })
        }
    }
}

/// Picks the workload container to patch. With a declared workload kind the
/// workload named after the service is used; otherwise deployments and then
/// statefulsets carrying the service labels are scanned for the first
/// container with the target name.
pub(super) async fn resolve_targets(
    client: &dyn ClusterClient,
    namespace: &str,
    selector: &LabelSelector,
    spec: &DeploySpec,
) -> Result<Vec<WorkloadTarget>, DeployError> {
    let container = spec.service_module.as_str();

    let target = match spec.workload_kind {
        Some(kind) => declared_target(client, namespace, kind, &spec.service_name, container).await?,
        None => scan_targets(client, namespace, selector, container).await?,
    };

    match target {
        Some(target) => {
            info!(
                "Resolved service {} to {}/{}/{} container {}",
                spec.service_name,
                namespace,
                target.kind.resource(),
                target.name,
                target.container
            );
            Ok(vec![target])
        }
        None => Err(DeployError::ContainerNotFound {
            service: spec.service_name.clone(),
            container: spec.service_module.clone(),
            env: spec.env.clone(),
        }),
    }
}

async fn declared_target(
    client: &dyn ClusterClient,
    namespace: &str,
    kind: WorkloadKind,
    name: &str,
    container: &str,
) -> Result<Option<WorkloadTarget>, DeployError> {
    let lookup_error = |source| DeployError::Lookup {
        resource: kind.resource(),
        namespace: namespace.to_string(),
        name: name.to_string(),
        source,
    };
    let missing = || ClusterError::NotFound {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    };

    let target = match kind {
        WorkloadKind::Deployment => {
            let deployment = client
                .get_deployment(namespace, name)
                .await
                .map_err(lookup_error)?
                .ok_or_else(|| lookup_error(missing()))?;
            first_match(std::slice::from_ref(&deployment), deployment_containers, container)
                .map(|(d, c)| to_target(kind, d.metadata.name.as_deref(), c))
        }
        WorkloadKind::StatefulSet => {
            let stateful_set = client
                .get_stateful_set(namespace, name)
                .await
                .map_err(lookup_error)?
                .ok_or_else(|| lookup_error(missing()))?;
            first_match(std::slice::from_ref(&stateful_set), stateful_set_containers, container)
                .map(|(s, c)| to_target(kind, s.metadata.name.as_deref(), c))
        }
    };
    Ok(target)
}

async fn scan_targets(
    client: &dyn ClusterClient,
    namespace: &str,
    selector: &LabelSelector,
    container: &str,
) -> Result<Option<WorkloadTarget>, DeployError> {
    let deployments = client
        .list_deployments(namespace, selector)
        .await
        .map_err(|source| DeployError::List {
            resource: WorkloadKind::Deployment.resource(),
            namespace: namespace.to_string(),
            source,
        })?;
    let stateful_sets = client
        .list_stateful_sets(namespace, selector)
        .await
        .map_err(|source| DeployError::List {
            resource: WorkloadKind::StatefulSet.resource(),
            namespace: namespace.to_string(),
            source,
        })?;

    debug!(
        "Found {} deployments and {} statefulsets matching {} in {}",
        deployments.len(),
        stateful_sets.len(),
        selector,
        namespace
    );

    if let Some((d, c)) = first_match(&deployments, deployment_containers, container) {
        return Ok(Some(to_target(WorkloadKind::Deployment, d.metadata.name.as_deref(), c)));
    }
    Ok(first_match(&stateful_sets, stateful_set_containers, container)
        .map(|(s, c)| to_target(WorkloadKind::StatefulSet, s.metadata.name.as_deref(), c)))
}

/// First `(workload, container)` pair, in order, whose container is named
/// `name`.
fn first_match<'a, W>(
    workloads: &'a [W],
    containers: impl Fn(&'a W) -> &'a [Container],
    name: &str,
) -> Option<(&'a W, &'a Container)> {
    workloads.iter().find_map(|workload| {
        containers(workload)
            .iter()
            .find(|c| c.name == name)
            .map(|c| (workload, c))
    })
}

fn deployment_containers(deployment: &Deployment) -> &[Container] {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .map(|pod| pod.containers.as_slice())
        .unwrap_or_default()
}

fn stateful_set_containers(stateful_set: &StatefulSet) -> &[Container] {
    stateful_set
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .map(|pod| pod.containers.as_slice())
        .unwrap_or_default()
}

fn to_target(kind: WorkloadKind, name: Option<&str>, container: &Container) -> WorkloadTarget {
    WorkloadTarget {
        kind,
        name: name.unwrap_or_default().to_string(),
        container: container.name.clone(),
        current_image: container.image.clone().unwrap_or_default(),
    }
}
