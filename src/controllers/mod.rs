pub mod deploy_job;

pub use deploy_job::{Ack, DeployError, DeployJobController, JobContext};
