use k8s_openapi::api::core::v1::{ContainerStatus, Pod};

const PHASE_RUNNING: &str = "Running";
const PHASE_SUCCEEDED: &str = "Succeeded";

/// Collects error messages from containers of pods that are neither running
/// nor completed. Containers without a message are still starting up and are
/// not reported.
pub fn pod_error_messages(pods: &[Pod]) -> Vec<String> {
    pods.iter()
        .filter_map(|pod| pod.status.as_ref())
        .filter(|status| {
            !matches!(status.phase.as_deref(), Some(PHASE_RUNNING) | Some(PHASE_SUCCEEDED))
        })
        .flat_map(|status| status.container_statuses.iter().flatten())
        .filter_map(describe_container)
        .collect()
}

fn describe_container(cs: &ContainerStatus) -> Option<String> {
    let state = cs.state.as_ref()?;
    let (name, reason, message) = if let Some(waiting) = &state.waiting {
        ("waiting", waiting.reason.clone(), waiting.message.clone())
    } else if let Some(terminated) = &state.terminated {
        ("terminated", terminated.reason.clone(), terminated.message.clone())
    } else if state.running.is_some() {
        ("running", None, None)
    } else {
        return None;
    };

    let message = message.filter(|m| !m.is_empty())?;
    Some(format!(
        "Status: {}, Reason: {}, Message: {}",
        name,
        reason.unwrap_or_default(),
        message
    ))
}
