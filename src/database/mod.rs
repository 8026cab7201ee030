//! Sqlite-backed persistence.
//!
//! The engine persists two JSON snapshots (routing stats, callback state)
//! into a small key/value table, written periodically and on shutdown.
//! Runtime queries only; no compile-time schema checking so the crate builds
//! without a database present.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use crate::callback::CallbackSnapshot;
use crate::error::Result;
use crate::routing::RoutingSnapshot;

const ROUTING_KEY: &str = "routing_state";
const CALLBACKS_KEY: &str = "callback_state";

/// Engine state store
#[derive(Clone)]
pub struct EngineDatabase {
    pool: SqlitePool,
}

impl EngineDatabase {
    /// Open (or create) the database at `path`. `":memory:"` opens an
    /// in-memory database, pinned to a single connection so every query
    /// sees the same data.
    pub async fn open(path: &str, max_connections: u32) -> Result<Self> {
        info!("🗄️ Opening engine database at {}", path);

        let in_memory = path == ":memory:";
        let options = if in_memory {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections })
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.initialize_schema().await?;

        info!("✅ Engine database ready");
        Ok(database)
    }

    async fn initialize_schema(&self) -> Result<()> {
        debug!("📋 Creating engine_state table");
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS engine_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the routing snapshot
    pub async fn save_routing_snapshot(&self, snapshot: &RoutingSnapshot) -> Result<()> {
        self.save_state(ROUTING_KEY, snapshot).await
    }

    /// Load the routing snapshot, if one was ever written
    pub async fn load_routing_snapshot(&self) -> Result<Option<RoutingSnapshot>> {
        self.load_state(ROUTING_KEY).await
    }

    /// Persist the callback snapshot
    pub async fn save_callback_snapshot(&self, snapshot: &CallbackSnapshot) -> Result<()> {
        self.save_state(CALLBACKS_KEY, snapshot).await
    }

    /// Load the callback snapshot, if one was ever written
    pub async fn load_callback_snapshot(&self) -> Result<Option<CallbackSnapshot>> {
        self.load_state(CALLBACKS_KEY).await
    }

    async fn save_state<T: serde::Serialize>(&self, key: &str, state: &T) -> Result<()> {
        let value = serde_json::to_string(state)?;
        sqlx::query(
            r#"
            INSERT INTO engine_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        debug!("💾 Persisted engine state '{}'", key);
        Ok(())
    }

    async fn load_state<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row = sqlx::query("SELECT value FROM engine_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let value: String = row.try_get("value")?;
                Ok(Some(serde_json::from_str(&value)?))
            }
            None => Ok(None),
        }
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
