use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::deploy::WorkloadKind;

pub const STATUS_DELETING: &str = "deleting";

/// A service template registered under a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub uid: String,
    pub service_name: String,
    /// None for shared services that no single project owns.
    pub project_name: Option<String>,
    pub service_type: String,
    pub workload_type: Option<WorkloadKind>,
    pub status: String,
    pub revision: i64,
    pub creation_timestamp: DateTime<Utc>,
}

impl ServiceInfo {
    pub fn new(service_name: String, project_name: Option<String>, service_type: String) -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            service_name,
            project_name,
            service_type,
            workload_type: None,
            status: String::new(),
            revision: 1,
            creation_timestamp: Utc::now(),
        }
    }
}

/// Lookup options for the service registry.
#[derive(Debug, Clone, Default)]
pub struct ServiceFindOptions {
    pub service_name: String,
    /// Unset searches across every project.
    pub project_name: Option<String>,
    pub exclude_status: Option<String>,
    pub service_type: Option<String>,
}

impl ServiceFindOptions {
    pub fn matches(&self, service: &ServiceInfo) -> bool {
        if service.service_name != self.service_name {
            return false;
        }
        if let Some(project) = &self.project_name {
            if service.project_name.as_deref() != Some(project.as_str()) {
                return false;
            }
        }
        if let Some(excluded) = &self.exclude_status {
            if &service.status == excluded {
                return false;
            }
        }
        if let Some(service_type) = &self.service_type {
            if &service.service_type != service_type {
                return false;
            }
        }
        true
    }
}
