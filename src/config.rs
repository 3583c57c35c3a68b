use std::time::Duration;

use crate::models::LabelSelector;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 60 * 10;
pub const PRODUCT_LABEL: &str = "s-product";
pub const SERVICE_LABEL: &str = "s-service";

/// Tunables shared by every deploy job.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
    /// Used when a job does not set its own timeout.
    pub default_timeout_secs: u64,
    pub product_label: String,
    pub service_label: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_timeout_secs: DEFAULT_DEPLOY_TIMEOUT_SECS,
            product_label: PRODUCT_LABEL.to_string(),
            service_label: SERVICE_LABEL.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Selector for the workloads and pods belonging to a project service.
    pub fn service_selector(&self, project_name: &str, service_name: &str) -> LabelSelector {
        LabelSelector::new()
            .with(self.product_label.clone(), project_name)
            .with(self.service_label.clone(), service_name)
    }
}
