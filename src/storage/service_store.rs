use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::Storage;
use crate::cluster::{self, StoreError};
use crate::models::{ServiceFindOptions, ServiceInfo, WorkloadKind};

pub struct ServiceStore {
    pool: SqlitePool,
}

impl ServiceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, service: &ServiceInfo) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO services (uid, service_name, project_name, service_type, workload_type, status, revision, creation_timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&service.uid)
        .bind(&service.service_name)
        .bind(&service.project_name)
        .bind(&service.service_type)
        .bind(service.workload_type.map(|kind| kind.to_string()))
        .bind(&service.status)
        .bind(service.revision)
        .bind(service.creation_timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_status(&self, uid: &str, status: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE services SET status = ? WHERE uid = ?")
            .bind(status)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Latest revision among the services matching `opts`.
    pub async fn find(&self, opts: &ServiceFindOptions) -> Result<ServiceInfo, StoreError> {
        let rows = sqlx::query(
            "SELECT uid, service_name, project_name, service_type, workload_type, status, revision, creation_timestamp
             FROM services WHERE service_name = ? ORDER BY revision DESC, rowid DESC",
        )
        .bind(&opts.service_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(Self::row_to_service)
            .find(|service| opts.matches(service))
            .ok_or_else(|| StoreError::NotFound(format!("service {}", opts.service_name)))
    }

    fn row_to_service(row: &SqliteRow) -> ServiceInfo {
        let created: String = row.get("creation_timestamp");
        let workload_type: Option<String> = row.get("workload_type");
        ServiceInfo {
            uid: row.get("uid"),
            service_name: row.get("service_name"),
            project_name: row.get("project_name"),
            service_type: row.get("service_type"),
            workload_type: workload_type.as_deref().and_then(WorkloadKind::parse),
            status: row.get("status"),
            revision: row.get("revision"),
            creation_timestamp: DateTime::parse_from_rfc3339(&created)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

#[async_trait]
impl cluster::ServiceRegistry for Storage {
    async fn find(&self, opts: &ServiceFindOptions) -> Result<ServiceInfo, StoreError> {
        self.services().find(opts).await
    }
}
