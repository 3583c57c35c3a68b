// Common test utilities: object builders and an in-memory cluster that
// records every call made against it.
#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStatus, StatefulSet, StatefulSetSpec, StatefulSetStatus,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerState, ContainerStateWaiting, ContainerStatus, Pod, PodSpec, PodStatus, PodTemplateSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use krust_deploy::cluster::{
    ClusterClient, ClusterError, ClusterRegistry, EnvironmentStore, ServiceRegistry, StoreError,
};
use krust_deploy::config::ControllerConfig;
use krust_deploy::controllers::{Ack, DeployJobController, JobContext};
use krust_deploy::models::{
    DeploySpec, Environment, JobStatus, JobTask, LabelSelector, ServiceFindOptions, ServiceInfo, WorkloadKind,
};

pub const PROJECT: &str = "shop";
pub const ENV: &str = "dev";
pub const NAMESPACE: &str = "shop-dev";

pub fn service_labels(service: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("s-product".to_string(), PROJECT.to_string());
    labels.insert("s-service".to_string(), service.to_string());
    labels
}

fn template(containers: &[(&str, &str)]) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: None,
        spec: Some(PodSpec {
            containers: containers
                .iter()
                .map(|(name, image)| Container {
                    name: name.to_string(),
                    image: Some(image.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
    }
}

/// A deployment whose controller has not caught up with generation 2 yet.
pub fn deployment(name: &str, service: &str, containers: &[(&str, &str)]) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            labels: Some(service_labels(service)),
            generation: Some(2),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            template: template(containers),
            ..Default::default()
        }),
        status: Some(DeploymentStatus {
            observed_generation: Some(1),
            replicas: Some(1),
            updated_replicas: Some(0),
            available_replicas: Some(1),
            ..Default::default()
        }),
    }
}

pub fn stateful_set(name: &str, service: &str, containers: &[(&str, &str)]) -> StatefulSet {
    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            labels: Some(service_labels(service)),
            generation: Some(2),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: name.to_string(),
            template: template(containers),
            ..Default::default()
        }),
        status: Some(StatefulSetStatus {
            observed_generation: Some(1),
            replicas: 1,
            updated_replicas: Some(0),
            ready_replicas: Some(1),
            ..Default::default()
        }),
    }
}

pub fn deployment_rolled_out(mut deployment: Deployment) -> Deployment {
    let generation = deployment.metadata.generation;
    deployment.status = Some(DeploymentStatus {
        observed_generation: generation,
        replicas: Some(1),
        updated_replicas: Some(1),
        available_replicas: Some(1),
        ready_replicas: Some(1),
        ..Default::default()
    });
    deployment
}

pub fn stateful_set_rolled_out(mut stateful_set: StatefulSet) -> StatefulSet {
    let generation = stateful_set.metadata.generation;
    stateful_set.status = Some(StatefulSetStatus {
        observed_generation: generation,
        replicas: 1,
        updated_replicas: Some(1),
        ready_replicas: Some(1),
        available_replicas: Some(1),
        ..Default::default()
    });
    stateful_set
}

/// A pod of `service` in `phase` whose only container is waiting with the
/// given reason and message.
pub fn pod(name: &str, service: &str, phase: &str, waiting: Option<(&str, &str)>) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            labels: Some(service_labels(service)),
            ..Default::default()
        },
        spec: None,
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            container_statuses: Some(vec![ContainerStatus {
                name: service.to_string(),
                state: waiting.map(|(reason, message)| ContainerState {
                    waiting: Some(ContainerStateWaiting {
                        reason: Some(reason.to_string()),
                        message: Some(message.to_string()),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

pub fn spec(service: &str, container: &str, image: &str) -> DeploySpec {
    DeploySpec {
        service_name: service.to_string(),
        service_module: container.to_string(),
        image: image.to_string(),
        env: ENV.to_string(),
        project_name: PROJECT.to_string(),
        timeout: 30,
        ..Default::default()
    }
}

pub fn service(name: &str, workload_type: Option<WorkloadKind>) -> ServiceInfo {
    let mut info = ServiceInfo::new(name.to_string(), Some(PROJECT.to_string()), "k8s".to_string());
    info.workload_type = workload_type;
    info
}

#[derive(Default)]
struct State {
    deployments: Vec<Deployment>,
    stateful_sets: Vec<StatefulSet>,
    pods: Vec<Pod>,
    environments: Vec<Environment>,
    services: Vec<ServiceInfo>,
    calls: Vec<String>,
    /// Workload name -> number of reads after which it reports rolled out.
    ready_after: HashMap<String, usize>,
    reads: HashMap<String, usize>,
    failing_reads: Vec<String>,
    fail_patches: bool,
    fail_pod_list: bool,
    cancel_on_read: Option<CancellationToken>,
    cancel_on_pod_list: Option<CancellationToken>,
}

/// In-memory cluster plus environment and service records.
#[derive(Default, Clone)]
pub struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        let cluster = Self::default();
        cluster.add_environment(Environment::new(
            PROJECT.to_string(),
            ENV.to_string(),
            NAMESPACE.to_string(),
        ));
        cluster
    }

    pub fn add_environment(&self, env: Environment) {
        self.state.lock().unwrap().environments.push(env);
    }

    pub fn add_service(&self, service: ServiceInfo) {
        self.state.lock().unwrap().services.push(service);
    }

    pub fn add_deployment(&self, deployment: Deployment) {
        self.state.lock().unwrap().deployments.push(deployment);
    }

    pub fn add_stateful_set(&self, stateful_set: StatefulSet) {
        self.state.lock().unwrap().stateful_sets.push(stateful_set);
    }

    pub fn add_pod(&self, pod: Pod) {
        self.state.lock().unwrap().pods.push(pod);
    }

    /// The named workload reports rolled out from its `reads`-th read on.
    pub fn ready_after(&self, name: &str, reads: usize) {
        self.state.lock().unwrap().ready_after.insert(name.to_string(), reads);
    }

    pub fn fail_reads_of(&self, name: &str) {
        self.state.lock().unwrap().failing_reads.push(name.to_string());
    }

    pub fn fail_patches(&self) {
        self.state.lock().unwrap().fail_patches = true;
    }

    pub fn fail_pod_list(&self) {
        self.state.lock().unwrap().fail_pod_list = true;
    }

    /// Cancels `token` while serving the next workload read.
    pub fn cancel_on_read(&self, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on_read = Some(token);
    }

    /// Cancels `token` while serving the next pod list.
    pub fn cancel_on_pod_list(&self, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on_pod_list = Some(token);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }

    pub fn image_of(&self, kind: WorkloadKind, name: &str, container: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let template = match kind {
            WorkloadKind::Deployment => state
                .deployments
                .iter()
                .find(|d| d.metadata.name.as_deref() == Some(name))
                .and_then(|d| d.spec.as_ref())
                .map(|s| s.template.clone()),
            WorkloadKind::StatefulSet => state
                .stateful_sets
                .iter()
                .find(|s| s.metadata.name.as_deref() == Some(name))
                .and_then(|s| s.spec.as_ref())
                .map(|s| s.template.clone()),
        }?;
        template
            .spec?
            .containers
            .into_iter()
            .find(|c| c.name == container)
            .and_then(|c| c.image)
    }

    /// Counts a read of `name`; returns whether it should look rolled out.
    fn record_read(state: &mut State, name: &str) -> Result<bool, ClusterError> {
        if let Some(token) = state.cancel_on_read.take() {
            token.cancel();
        }
        if state.failing_reads.iter().any(|n| n == name) {
            return Err(ClusterError::Other(format!("connection reset reading {}", name)));
        }
        let reads = state.reads.entry(name.to_string()).or_insert(0);
        *reads += 1;
        Ok(state.ready_after.get(name).map_or(false, |n| *reads >= *n))
    }

    pub fn context(&self) -> JobContext {
        JobContext {
            environments: Arc::new(self.clone()),
            services: Arc::new(self.clone()),
            clusters: Arc::new(ClusterRegistry::new(Arc::new(self.clone()))),
        }
    }

    /// Builds a controller for `spec` whose status changes are recorded.
    pub fn controller(&self, spec: DeploySpec, config: ControllerConfig) -> (DeployJobController, Arc<Mutex<Vec<JobStatus>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let acks = seen.clone();
        let ack: Ack = Box::new(move |job: &JobTask| acks.lock().unwrap().push(job.status));
        let job = JobTask::new("deploy-job".to_string(), spec);
        (DeployJobController::new(job, self.context(), config, ack), seen)
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_deployments(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Deployment>, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("list:deployments:{}", namespace));
        Ok(state
            .deployments
            .iter()
            .filter(|d| d.metadata.namespace.as_deref() == Some(namespace))
            .filter(|d| selector.matches(d.metadata.labels.as_ref()))
            .cloned()
            .collect())
    }

    async fn list_stateful_sets(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<StatefulSet>, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("list:statefulsets:{}", namespace));
        Ok(state
            .stateful_sets
            .iter()
            .filter(|s| s.metadata.namespace.as_deref() == Some(namespace))
            .filter(|s| selector.matches(s.metadata.labels.as_ref()))
            .cloned()
            .collect())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("get:deployments:{}", name));
        let rolled_out = Self::record_read(&mut state, name)?;
        let found = state
            .deployments
            .iter()
            .find(|d| d.metadata.namespace.as_deref() == Some(namespace) && d.metadata.name.as_deref() == Some(name))
            .cloned();
        Ok(found.map(|d| if rolled_out { deployment_rolled_out(d) } else { d }))
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("get:statefulsets:{}", name));
        let rolled_out = Self::record_read(&mut state, name)?;
        let found = state
            .stateful_sets
            .iter()
            .find(|s| s.metadata.namespace.as_deref() == Some(namespace) && s.metadata.name.as_deref() == Some(name))
            .cloned();
        Ok(found.map(|s| if rolled_out { stateful_set_rolled_out(s) } else { s }))
    }

    async fn update_container_image(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        container: &str,
        image: &str,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("update:{}:{}:{}", kind.resource(), name, container));
        if state.fail_patches {
            return Err(ClusterError::Other("admission webhook denied the request".to_string()));
        }

        let template = match kind {
            WorkloadKind::Deployment => state
                .deployments
                .iter_mut()
                .find(|d| d.metadata.name.as_deref() == Some(name))
                .and_then(|d| d.spec.as_mut())
                .map(|s| &mut s.template),
            WorkloadKind::StatefulSet => state
                .stateful_sets
                .iter_mut()
                .find(|s| s.metadata.name.as_deref() == Some(name))
                .and_then(|s| s.spec.as_mut())
                .map(|s| &mut s.template),
        };
        let target = template
            .and_then(|t| t.spec.as_mut())
            .and_then(|p| p.containers.iter_mut().find(|c| c.name == container))
            .ok_or_else(|| ClusterError::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        target.image = Some(image.to_string());
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("list:pods:{}", namespace));
        if let Some(token) = state.cancel_on_pod_list.take() {
            token.cancel();
        }
        if state.fail_pod_list {
            return Err(ClusterError::Other("etcd unavailable".to_string()));
        }
        Ok(state
            .pods
            .iter()
            .filter(|p| selector.matches(p.metadata.labels.as_ref()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EnvironmentStore for FakeCluster {
    async fn find(&self, project_name: &str, env_name: &str) -> Result<Environment, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .environments
            .iter()
            .find(|e| e.project_name == project_name && e.env_name == env_name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("environment {} of project {}", env_name, project_name)))
    }
}

#[async_trait]
impl ServiceRegistry for FakeCluster {
    async fn find(&self, opts: &ServiceFindOptions) -> Result<ServiceInfo, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!(
            "find:service:{}:{}",
            opts.service_name,
            opts.project_name.as_deref().unwrap_or("*")
        ));
        state
            .services
            .iter()
            .rev()
            .find(|s| opts.matches(s))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("service {}", opts.service_name)))
    }
}
