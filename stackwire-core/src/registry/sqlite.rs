//! Durable registry backed by SQLite.
//!
//! One database file per environment. Several deployment processes may open
//! the same file; reads always go to the database so a consumer sees writes
//! made by a publisher running in another process.

use super::{migrations, Registry};
use crate::error::{Result, StackwireError};
use crate::observability::metrics;
use crate::types::{RegistryEntry, RegistryKey, ValueKind};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, instrument};

/// SQLite-backed registry.
#[derive(Clone)]
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    /// Open (or create) a registry database at the given path.
    #[instrument(skip(db_path), fields(path = %db_path.as_ref().display()))]
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        let in_memory = db_path == Path::new(":memory:");

        if !in_memory {
            if let Some(parent) = db_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StackwireError::IoError { path: parent.to_path_buf(), source: e })?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_path.to_str().ok_or_else(|| {
            StackwireError::InvalidConfig { reason: "Invalid registry database path".to_string() }
        })?)
        .map_err(|e| StackwireError::DatabaseError(e.to_string()))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

        // Every connection to ":memory:" is a separate database.
        let max_connections = if in_memory { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StackwireError::DatabaseError(e.to_string()))?;

        migrations::run(&pool).await?;

        info!("Registry database ready");
        Ok(Self { pool })
    }

    /// Registry in a private in-memory database (for tests).
    pub async fn open_in_memory() -> Result<Self> {
        Self::open(":memory:").await
    }

    fn entry_from_row(row: &SqliteRow) -> Result<RegistryEntry> {
        let key: String = row.get("key");
        let kind: String = row.get("kind");
        let updated_at: i64 = row.get("updated_at");

        Ok(RegistryEntry {
            key: RegistryKey::parse(&key)?,
            value: row.get("value"),
            kind: ValueKind::from_str(&kind)
                .map_err(|e| StackwireError::DatabaseError(e.to_string()))?,
            owner: row.get("owner"),
            updated_at: SystemTime::UNIX_EPOCH + Duration::from_secs(updated_at.max(0) as u64),
        })
    }
}

#[async_trait]
impl Registry for SqliteRegistry {
    #[instrument(skip(self, entry), fields(key = %entry.key))]
    async fn put_entry(&self, entry: RegistryEntry) -> Result<()> {
        let updated_at = entry
            .updated_at
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO entries (key, value, kind, owner, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.key.as_str())
        .bind(&entry.value)
        .bind(entry.kind.as_str())
        .bind(entry.owner.as_deref())
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StackwireError::RegistryWriteFailure {
            key: entry.key.to_string(),
            reason: e.to_string(),
        })?;

        metrics::record_registry_put();
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn fetch(&self, key: &RegistryKey) -> Result<Option<RegistryEntry>> {
        let row = sqlx::query(
            "SELECT key, value, kind, owner, updated_at FROM entries WHERE key = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StackwireError::DatabaseError(e.to_string()))?;

        metrics::record_registry_lookup(row.is_some());
        debug!(hit = row.is_some(), "Registry lookup");

        row.as_ref().map(Self::entry_from_row).transpose()
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &RegistryKey) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entries WHERE key = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StackwireError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<RegistryEntry>> {
        let rows = sqlx::query(
            "SELECT key, value, kind, owner, updated_at FROM entries ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StackwireError::DatabaseError(e.to_string()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = Self::entry_from_row(row)?;
            if entry.key.has_prefix(prefix) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> RegistryKey {
        RegistryKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let registry = SqliteRegistry::open_in_memory().await.unwrap();

        registry.put(&key("/appshell/vpc/id"), "vpc-1").await.unwrap();
        registry.put(&key("/appshell/vpc/id"), "vpc-2").await.unwrap();

        assert_eq!(registry.get(&key("/appshell/vpc/id")).await.unwrap(), "vpc-2");
        assert_eq!(registry.list("/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_entry_metadata_is_stored() {
        let registry = SqliteRegistry::open_in_memory().await.unwrap();

        let entry = RegistryEntry::list(key("/appshell/vpc/subnets/island-reserved-2"), &["s-1"])
            .unwrap()
            .owned_by("app-shell");
        registry.put_entry(entry).await.unwrap();

        let stored = registry
            .fetch(&key("/appshell/vpc/subnets/island-reserved-2"))
            .await
            .unwrap()
            .expect("entry should exist");
        assert_eq!(stored.kind, ValueKind::JsonList);
        assert_eq!(stored.owner.as_deref(), Some("app-shell"));
        assert_eq!(stored.decode_list().unwrap(), vec!["s-1"]);
    }

    #[tokio::test]
    async fn test_delete_missing_key() {
        let registry = SqliteRegistry::open_in_memory().await.unwrap();
        assert!(!registry.delete(&key("/appshell/vpc/id")).await.unwrap());
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        {
            let registry = SqliteRegistry::open(&path).await.unwrap();
            registry.put(&key("/appshell/loadBalancer/dnsName"), "shell.internal").await.unwrap();
        }

        let reopened = SqliteRegistry::open(&path).await.unwrap();
        assert_eq!(
            reopened.get(&key("/appshell/loadBalancer/dnsName")).await.unwrap(),
            "shell.internal"
        );
    }

    #[tokio::test]
    async fn test_concurrent_first_open_of_fresh_file() {
        let dir = tempfile::tempdir().unwrap();

        for round in 0..20 {
            let path = dir.path().join(format!("registry-{}.db", round));

            let (first, second) =
                tokio::join!(SqliteRegistry::open(&path), SqliteRegistry::open(&path));
            let first = first.unwrap();
            let second = second.unwrap();

            first.put(&key("/appshell/vpc/id"), "vpc-1").await.unwrap();
            assert_eq!(second.get(&key("/appshell/vpc/id")).await.unwrap(), "vpc-1");
        }
    }
}
