use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::cluster::StoreError;
use crate::models::{DeploySpec, JobTask};

pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts the job record or replaces the stored snapshot of it.
    pub async fn save(&self, job: &JobTask) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO jobs (uid, name, status, error, spec, start_time, end_time)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(uid) DO UPDATE SET
                status = excluded.status,
                error = excluded.error,
                spec = excluded.spec,
                end_time = excluded.end_time",
        )
        .bind(&job.uid)
        .bind(&job.name)
        .bind(job.status.as_str())
        .bind(&job.error)
        .bind(serde_json::to_string(&job.spec)?)
        .bind(job.start_time.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(job.end_time.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, uid: &str) -> Result<JobTask, StoreError> {
        let row = sqlx::query(
            "SELECT uid, name, status, error, spec, start_time, end_time FROM jobs WHERE uid = ?",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("job {}", uid)))?;

        let status: String = row.get("status");
        let spec: String = row.get("spec");
        let start_time: String = row.get("start_time");
        let end_time: Option<String> = row.get("end_time");

        Ok(JobTask {
            uid: row.get("uid"),
            name: row.get("name"),
            status: serde_json::from_value(serde_json::Value::String(status))?,
            error: row.get("error"),
            spec: serde_json::from_str::<DeploySpec>(&spec)?,
            start_time: parse_time(&start_time).unwrap_or_else(Utc::now),
            end_time: end_time.as_deref().and_then(parse_time),
        })
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
