//! Optional write-through result cache
//!
//! Stores `(run_id, phase, payload)` tuples in sqlite so completed phases
//! survive restarts and repeat subjects can be served warm. The pipeline
//! functions identically with the cache absent: a miss is not an error, and
//! write failures degrade to a warning.

use dossier_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

/// Sqlite-backed phase result cache
#[derive(Clone)]
pub struct ResultCache {
    pool: SqlitePool,
}

impl ResultCache {
    /// Open (or create) the cache database at the given path
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS research_cache (
                run_id TEXT NOT NULL,
                phase TEXT NOT NULL,
                payload TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (run_id, phase)
            )",
        )
        .execute(&pool)
        .await?;

        tracing::info!(path = %path.display(), "Result cache opened");

        Ok(Self { pool })
    }

    /// Write one phase payload through to the cache
    pub async fn save_phase(
        &self,
        run_id: Uuid,
        phase: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO research_cache (run_id, phase, payload, cached_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(run_id.to_string())
        .bind(phase)
        .bind(payload.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load one phase payload, None on cache miss
    pub async fn load_phase(&self, run_id: Uuid, phase: &str) -> Result<Option<serde_json::Value>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT payload FROM research_cache WHERE run_id = ? AND phase = ?",
        )
        .bind(run_id.to_string())
        .bind(phase)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((payload,)) => {
                let value = serde_json::from_str(&payload).map_err(|e| {
                    dossier_common::Error::Internal(format!("corrupt cache payload: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}
