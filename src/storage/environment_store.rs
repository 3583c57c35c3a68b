use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::Storage;
use crate::cluster::{self, StoreError};
use crate::models::Environment;

pub struct EnvironmentStore {
    pool: SqlitePool,
}

impl EnvironmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, env: &Environment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO environments (uid, project_name, env_name, namespace, cluster_id, creation_timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&env.uid)
        .bind(&env.project_name)
        .bind(&env.env_name)
        .bind(&env.namespace)
        .bind(&env.cluster_id)
        .bind(env.creation_timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find(&self, project_name: &str, env_name: &str) -> Result<Environment, StoreError> {
        let row = sqlx::query(
            "SELECT uid, project_name, env_name, namespace, cluster_id, creation_timestamp
             FROM environments WHERE project_name = ? AND env_name = ?",
        )
        .bind(project_name)
        .bind(env_name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Self::row_to_environment(&row)),
            None => Err(StoreError::NotFound(format!(
                "environment {} of project {}",
                env_name, project_name
            ))),
        }
    }

    fn row_to_environment(row: &SqliteRow) -> Environment {
        let created: String = row.get("creation_timestamp");
        Environment {
            uid: row.get("uid"),
            project_name: row.get("project_name"),
            env_name: row.get("env_name"),
            namespace: row.get("namespace"),
            cluster_id: row.get("cluster_id"),
            creation_timestamp: DateTime::parse_from_rfc3339(&created)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

#[async_trait]
impl cluster::EnvironmentStore for Storage {
    async fn find(&self, project_name: &str, env_name: &str) -> Result<Environment, StoreError> {
        self.environments().find(project_name, env_name).await
    }
}
