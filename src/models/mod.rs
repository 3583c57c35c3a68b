pub mod deploy;
pub mod environment;
pub mod labels;
pub mod service;

pub use deploy::{DeploySpec, JobStatus, JobTask, ReplaceResource, WorkloadKind};
pub use environment::Environment;
pub use labels::LabelSelector;
pub use service::{ServiceFindOptions, ServiceInfo};
