use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};

// Missing spec.replicas means the API-server default.
const DEFAULT_REPLICAS: i32 = 1;

/// A deployment is ready once its controller has observed the latest
/// generation and every desired replica runs the new template and is
/// available. Replicas from the previous template must be gone.
pub fn deployment_ready(deployment: &Deployment) -> bool {
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(DEFAULT_REPLICAS);
    let Some(status) = deployment.status.as_ref() else {
        return false;
    };

    generation_observed(deployment.metadata.generation, status.observed_generation)
        && status.updated_replicas.unwrap_or(0) == desired
        && status.available_replicas.unwrap_or(0) == desired
        && status.replicas.unwrap_or(0) == desired
}

pub fn stateful_set_ready(stateful_set: &StatefulSet) -> bool {
    let desired = stateful_set
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(DEFAULT_REPLICAS);
    let Some(status) = stateful_set.status.as_ref() else {
        return false;
    };

    // availableReplicas is only reported by newer API servers.
    let available = status.available_replicas.or(status.ready_replicas).unwrap_or(0);

    generation_observed(stateful_set.metadata.generation, status.observed_generation)
        && status.updated_replicas.unwrap_or(0) == desired
        && available == desired
}

fn generation_observed(generation: Option<i64>, observed: Option<i64>) -> bool {
    observed.unwrap_or(0) >= generation.unwrap_or(0)
}
