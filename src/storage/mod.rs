pub mod environment_store;
pub mod job_store;
pub mod local_cluster;
pub mod object_store;
pub mod service_store;

use anyhow::Result;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Pod;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::sync::Arc;

use self::environment_store::EnvironmentStore;
use self::job_store::JobStore;
use self::object_store::ObjectStore;
use self::service_store::ServiceStore;

/// SQLite-backed state: the local cluster's objects plus the environment,
/// service and job records deploy jobs read and write.
#[derive(Clone)]
pub struct Storage {
    pub pool: Arc<SqlitePool>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Every connection to `sqlite::memory:` opens its own database, so the
    /// pool is pinned to a single connection that never expires.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let storage = Self {
            pool: Arc::new(pool),
        };
        storage.migrate().await?;
        Ok(storage)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&*self.pool).await?;
        Ok(())
    }

    pub fn deployments(&self) -> ObjectStore<Deployment> {
        ObjectStore::new((*self.pool).clone())
    }

    pub fn statefulsets(&self) -> ObjectStore<StatefulSet> {
        ObjectStore::new((*self.pool).clone())
    }

    pub fn pods(&self) -> ObjectStore<Pod> {
        ObjectStore::new((*self.pool).clone())
    }

    pub fn environments(&self) -> EnvironmentStore {
        EnvironmentStore::new((*self.pool).clone())
    }

    pub fn services(&self) -> ServiceStore {
        ServiceStore::new((*self.pool).clone())
    }

    pub fn jobs(&self) -> JobStore {
        JobStore::new((*self.pool).clone())
    }
}
