use chrono::{SecondsFormat, Utc};
use json_patch::Patch;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::{Metadata, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::marker::PhantomData;
use uuid::Uuid;

use crate::cluster::ClusterError;
use crate::models::LabelSelector;

/// Namespaced cluster objects of one kind, kept in the table named after the
/// kind's URL path segment (`deployments`, `statefulsets`, `pods`).
pub struct ObjectStore<K> {
    pool: SqlitePool,
    _kind: PhantomData<K>,
}

impl<K> ObjectStore<K>
where
    K: Resource + Metadata<Ty = ObjectMeta> + Serialize + DeserializeOwned,
{
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _kind: PhantomData,
        }
    }

    fn table() -> &'static str {
        K::URL_PATH_SEGMENT
    }

    pub async fn create(&self, namespace: &str, object: &K) -> Result<K, ClusterError> {
        let uid = Uuid::new_v4().to_string();
        let name = object
            .metadata()
            .name
            .clone()
            .ok_or(ClusterError::MissingName { kind: K::KIND })?;
        if self.get_value(namespace, &name).await?.is_some() {
            return Err(ClusterError::AlreadyExists {
                kind: K::KIND.to_string(),
                namespace: namespace.to_string(),
                name,
            });
        }
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let value = serde_json::to_value(object)?;
        let labels = value["metadata"]["labels"].to_string();
        let spec = value["spec"].to_string();
        let status = value["status"].to_string();

        let query = format!(
            "INSERT INTO {} (uid, name, namespace, resource_version, generation, creation_timestamp, labels, spec, status)
             VALUES (?, ?, ?, 1, 1, ?, ?, ?, ?)",
            Self::table()
        );
        sqlx::query(&query)
            .bind(&uid)
            .bind(&name)
            .bind(namespace)
            .bind(&now)
            .bind(&labels)
            .bind(&spec)
            .bind(&status)
            .execute(&self.pool)
            .await?;

        self.get(namespace, &name).await?.ok_or_else(|| ClusterError::NotFound {
            kind: K::KIND.to_string(),
            namespace: namespace.to_string(),
            name,
        })
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ClusterError> {
        match self.get_value(namespace, name).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Objects in `namespace` whose labels satisfy `selector`, oldest first.
    pub async fn list(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<K>, ClusterError> {
        let query = format!(
            "SELECT uid, name, namespace, resource_version, generation, creation_timestamp, labels, spec, status
             FROM {} WHERE namespace = ? AND deletion_timestamp IS NULL ORDER BY rowid",
            Self::table()
        );
        let rows = sqlx::query(&query).bind(namespace).fetch_all(&self.pool).await?;

        let mut items = Vec::new();
        for row in rows {
            let object: K = serde_json::from_value(Self::row_to_value(&row)?)?;
            if selector.matches(object.metadata().labels.as_ref()) {
                items.push(object);
            }
        }
        Ok(items)
    }

    /// Applies a JSON patch to the stored object. The generation moves only
    /// when the spec actually changed.
    pub async fn patch(&self, namespace: &str, name: &str, patch: &Patch) -> Result<K, ClusterError> {
        let current = self
            .get_value(namespace, name)
            .await?
            .ok_or_else(|| ClusterError::NotFound {
                kind: K::KIND.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;

        let mut updated = current.clone();
        json_patch::patch(&mut updated, patch)?;

        let resource_version = current["metadata"]["resourceVersion"]
            .as_str()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(1);
        let generation = current["metadata"]["generation"].as_i64().unwrap_or(1);
        let new_generation = if updated["spec"] != current["spec"] {
            generation + 1
        } else {
            generation
        };

        let query = format!(
            "UPDATE {} SET resource_version = ?, generation = ?, labels = ?, spec = ?, status = ?
             WHERE namespace = ? AND name = ? AND deletion_timestamp IS NULL",
            Self::table()
        );
        sqlx::query(&query)
            .bind(resource_version + 1)
            .bind(new_generation)
            .bind(updated["metadata"]["labels"].to_string())
            .bind(updated["spec"].to_string())
            .bind(updated["status"].to_string())
            .bind(namespace)
            .bind(name)
            .execute(&self.pool)
            .await?;

        updated["metadata"]["resourceVersion"] = json!((resource_version + 1).to_string());
        updated["metadata"]["generation"] = json!(new_generation);
        Ok(serde_json::from_value(updated)?)
    }

    pub async fn update_status<S: Serialize>(&self, namespace: &str, name: &str, status: &S) -> Result<(), ClusterError> {
        let query = format!(
            "UPDATE {} SET status = ?, resource_version = resource_version + 1
             WHERE namespace = ? AND name = ? AND deletion_timestamp IS NULL",
            Self::table()
        );
        let result = sqlx::query(&query)
            .bind(serde_json::to_value(status)?.to_string())
            .bind(namespace)
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ClusterError::NotFound {
                kind: K::KIND.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let query = format!(
            "UPDATE {} SET deletion_timestamp = ? WHERE namespace = ? AND name = ? AND deletion_timestamp IS NULL",
            Self::table()
        );
        sqlx::query(&query)
            .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
            .bind(namespace)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_value(&self, namespace: &str, name: &str) -> Result<Option<Value>, ClusterError> {
        let query = format!(
            "SELECT uid, name, namespace, resource_version, generation, creation_timestamp, labels, spec, status
             FROM {} WHERE namespace = ? AND name = ? AND deletion_timestamp IS NULL",
            Self::table()
        );
        let row = sqlx::query(&query)
            .bind(namespace)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_value(&row)?)),
            None => Ok(None),
        }
    }

    fn row_to_value(row: &SqliteRow) -> Result<Value, ClusterError> {
        let namespace: String = row.get("namespace");
        let name: String = row.get("name");

        let mut object = json!({
            "apiVersion": K::API_VERSION,
            "kind": K::KIND,
            "metadata": {
                "uid": row.get::<String, _>("uid"),
                "name": name,
                "namespace": namespace,
                "resourceVersion": row.get::<i64, _>("resource_version").to_string(),
                "generation": row.get::<i64, _>("generation"),
                "creationTimestamp": row.get::<String, _>("creation_timestamp"),
            },
            "spec": serde_json::from_str::<Value>(&row.get::<String, _>("spec"))?,
            "status": serde_json::from_str::<Value>(&row.get::<String, _>("status"))?
        });

        let labels = serde_json::from_str::<Value>(&row.get::<String, _>("labels"))?;
        if !labels.is_null() {
            object["metadata"]["labels"] = labels;
        }
        Ok(object)
    }
}
