//! SQLite-backed key/value slot for the active job.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

use crate::job::{unix_timestamp, JobState};

/// Fixed key of the single job slot.
pub const JOB_KEY: &str = "fetchx_job";

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the job store.
///
/// The database file lives under the XDG state directory:
/// `~/.local/state/fetchx/job.db`.
#[derive(Debug, Clone)]
pub struct JobStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl JobStore {
    /// Open (or create) the default store and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchx")?;
        let db_path = xdg_dirs.get_state_home().join("job.db");
        Self::open_at(db_path).await
    }

    /// Open (or create) the store at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await
            .with_context(|| format!("open job store at {}", path.display()))?;
        let store = JobStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Write the whole job into the slot, replacing whatever was there.
    pub async fn save(&self, job: &JobState) -> Result<()> {
        let value = serde_json::to_string(job)?;
        sqlx::query(
            r#"
            INSERT INTO slots (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE
            SET value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(JOB_KEY)
        .bind(value)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Read the job back; `None` means the slot is empty.
    pub async fn load(&self) -> Result<Option<JobState>> {
        let row = sqlx::query(
            r#"
            SELECT value FROM slots
            WHERE key = ?1
            "#,
        )
        .bind(JOB_KEY)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let value: String = row.get("value");
        let job = serde_json::from_str(&value).context("stored job is not valid JSON")?;
        Ok(Some(job))
    }

    /// Seconds-since-epoch of the last successful save, if a job is stored.
    pub async fn updated_at(&self) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT updated_at FROM slots WHERE key = ?1")
            .bind(JOB_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("updated_at")))
    }

    /// Empty the slot. Returns whether a job was removed.
    pub async fn clear(&self) -> Result<bool> {
        let r = sqlx::query(
            r#"
            DELETE FROM slots
            WHERE key = ?1
            "#,
        )
        .bind(JOB_KEY)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }
}

#[cfg(test)]
/// Open an in-memory store for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<JobStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = JobStore { pool };
    store.migrate().await?;
    Ok(store)
}
