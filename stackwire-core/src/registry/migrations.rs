//! Registry database migrations.
//!
//! Several deployment processes may open a fresh registry file at the same
//! time. The version check and every migration step run inside a single
//! `BEGIN IMMEDIATE` transaction, so the second opener waits for the write
//! lock and then sees the schema the first one created.

use crate::error::{Result, StackwireError};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, instrument, warn};

const SCHEMA_VERSION: i64 = 2;

fn failed(e: sqlx::Error) -> StackwireError {
    StackwireError::MigrationFailed { reason: e.to_string() }
}

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    let mut conn = pool.acquire().await.map_err(failed)?;

    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await.map_err(failed)?;

    match migrate(&mut conn).await {
        Ok(()) => {
            sqlx::query("COMMIT").execute(&mut *conn).await.map_err(failed)?;
            Ok(())
        }
        Err(e) => {
            if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!("Failed to roll back registry migration: {}", rollback);
            }
            Err(e)
        }
    }
}

async fn migrate(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(&mut *conn)
    .await
    .map_err(failed)?;

    // Read under the write lock; another process may have migrated already.
    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&mut *conn)
            .await
            .map_err(failed)?;

    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("Registry schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!("Migrating registry from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(conn).await?;
    }

    if current_version < 2 {
        migrate_to_v2(conn).await?;
    }

    Ok(())
}

async fn migrate_to_v1(conn: &mut SqliteConnection) -> Result<()> {
    info!("Running migration to schema version 1");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            kind TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await
    .map_err(failed)?;

    set_version(conn, 1).await
}

/// Track which stack published each entry, for manual stale-entry cleanup.
async fn migrate_to_v2(conn: &mut SqliteConnection) -> Result<()> {
    info!("Running migration to schema version 2");

    sqlx::query("ALTER TABLE entries ADD COLUMN owner TEXT")
        .execute(&mut *conn)
        .await
        .map_err(failed)?;

    set_version(conn, 2).await
}

async fn set_version(conn: &mut SqliteConnection, version: i64) -> Result<()> {
    sqlx::query("DELETE FROM schema_version").execute(&mut *conn).await.map_err(failed)?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(&mut *conn)
        .await
        .map_err(failed)?;

    Ok(())
}
