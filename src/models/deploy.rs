use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Workload kinds a deploy job knows how to patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

impl WorkloadKind {
    /// Plural resource name, as used in API paths.
    pub fn resource(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployments",
            WorkloadKind::StatefulSet => "statefulsets",
        }
    }

    /// Parses the kind recorded in the service registry. Empty means unset.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Deployment" => Some(WorkloadKind::Deployment),
            "StatefulSet" => Some(WorkloadKind::StatefulSet),
            _ => None,
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Deployment => f.write_str("Deployment"),
            WorkloadKind::StatefulSet => f.write_str("StatefulSet"),
        }
    }
}

/// One workload container that was actually mutated during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceResource {
    pub kind: WorkloadKind,
    pub name: String,
    pub container: String,
    pub origin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySpec {
    pub service_name: String,
    /// Container name inside the workload's pod template.
    pub service_module: String,
    #[serde(default)]
    pub service_type: Option<String>,
    pub image: String,
    pub env: String,
    pub project_name: String,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub workload_kind: Option<WorkloadKind>,
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub skip_check_run_status: bool,
    #[serde(default)]
    pub replace_resources: Vec<ReplaceResource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Passed,
    Failed,
    Timeout,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Passed => "passed",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job record the deploy controller reports into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTask {
    pub uid: String,
    pub name: String,
    pub status: JobStatus,
    pub error: String,
    pub spec: DeploySpec,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl JobTask {
    pub fn new(name: String, spec: DeploySpec) -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            name,
            status: JobStatus::Running,
            error: String::new(),
            spec,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Moves the job to a terminal status. Returns false when the job had
    /// already finished; the earlier outcome is kept.
    pub fn finish(&mut self, status: JobStatus, error: impl Into<String>) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.error = error.into();
        self.end_time = Some(Utc::now());
        true
    }
}
