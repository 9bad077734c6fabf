//! Append-only chat history, backed by Postgres when configured.
//!
//! History is an auxiliary record: appends are best-effort and never fail a
//! query, reads degrade to an empty list. Without `CHAT_HISTORY_URL` the
//! adapter is a no-op.

use chrono::{DateTime, Utc};
use finsight_observability::{info, warn};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query_id: Option<String>,
    pub query: String,
    pub response: String,
    pub mode: Option<String>,
    pub matching_transactions_count: Option<i64>,
    pub filters_applied: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub struct ChatHistory {
    pool: Option<PgPool>,
}

impl ChatHistory {
    /// Connect if a URL is configured; any failure degrades to the no-op
    /// adapter with a warning rather than refusing to start.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else {
            info!("chat history disabled (no CHAT_HISTORY_URL)");
            return Self { pool: None };
        };

        match PgPoolOptions::new().max_connections(5).connect(url).await {
            Ok(pool) => {
                if let Err(e) = Self::ensure_schema(&pool).await {
                    warn!(error = %e, "failed to prepare chat_history table; history disabled");
                    return Self { pool: None };
                }
                info!("chat history connected");
                Self { pool: Some(pool) }
            }
            Err(e) => {
                warn!(error = %e, "failed to connect chat history database; history disabled");
                Self { pool: None }
            }
        }
    }

    pub fn disabled() -> Self {
        Self { pool: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    async fn ensure_schema(pool: &PgPool) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                query_id TEXT,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                mode TEXT,
                matching_transactions_count BIGINT,
                filters_applied TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_history_user_time
             ON chat_history (user_id, created_at DESC)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Append one interaction. Failures are logged and swallowed.
    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        user_id: &str,
        query: &str,
        response: &str,
        query_id: &str,
        mode: &str,
        matching_transactions_count: usize,
        filters_applied: &[String],
    ) {
        let Some(pool) = &self.pool else { return };

        let filters_json =
            serde_json::to_string(filters_applied).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO chat_history
                (user_id, query_id, query, response, mode, matching_transactions_count, filters_applied)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user_id)
        .bind(query_id)
        .bind(query)
        .bind(response)
        .bind(mode)
        .bind(matching_transactions_count as i64)
        .bind(filters_json)
        .execute(pool)
        .await;

        match result {
            Ok(_) => info!(user_id, query_id, "chat interaction recorded"),
            Err(e) => warn!(user_id, error = %e, "failed to record chat interaction"),
        }
    }

    /// Recent interactions for a user, newest first. Failures degrade to an
    /// empty list.
    pub async fn list(&self, user_id: &str, limit: i64) -> Vec<HistoryEntry> {
        let Some(pool) = &self.pool else { return Vec::new() };

        let rows = sqlx::query(
            r#"
            SELECT query_id, query, response, mode, matching_transactions_count,
                   filters_applied, created_at
            FROM chat_history
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit.clamp(1, 500))
        .fetch_all(pool)
        .await;

        match rows {
            Ok(rows) => rows
                .into_iter()
                .map(|row| HistoryEntry {
                    query_id: row.get("query_id"),
                    query: row.get("query"),
                    response: row.get("response"),
                    mode: row.get("mode"),
                    matching_transactions_count: row.get("matching_transactions_count"),
                    filters_applied: row
                        .get::<Option<String>, _>("filters_applied")
                        .and_then(|raw| serde_json::from_str(&raw).ok())
                        .unwrap_or_default(),
                    created_at: row.get("created_at"),
                })
                .collect(),
            Err(e) => {
                warn!(user_id, error = %e, "failed to read chat history");
                Vec::new()
            }
        }
    }
}
