use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;

use super::ServiceKind;
use crate::common::RequestId;

/// Entry in a request's log sub-collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub before: serde_json::Value,
    pub after: serde_json::Value,
}

#[derive(sqlx::FromRow)]
struct LogRow {
    logged_at: DateTime<Utc>,
    message: String,
    before: Json<serde_json::Value>,
    after: Json<serde_json::Value>,
}

impl From<LogRow> for RequestLogEntry {
    fn from(row: LogRow) -> Self {
        Self {
            timestamp: row.logged_at,
            message: row.message,
            before: row.before.0,
            after: row.after.0,
        }
    }
}

impl RequestLogEntry {
    /// Append to the request's log (append-only)
    pub async fn append(
        kind: ServiceKind,
        request_id: RequestId,
        entry: &RequestLogEntry,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO request_logs (request_kind, request_id, logged_at, message, before, after)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(kind.as_str())
        .bind(request_id)
        .bind(entry.timestamp)
        .bind(&entry.message)
        .bind(Json(&entry.before))
        .bind(Json(&entry.after))
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Log entries for a request, oldest first
    pub async fn find_by_request(
        kind: ServiceKind,
        request_id: RequestId,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, LogRow>(
            "SELECT logged_at, message, before, after
             FROM request_logs
             WHERE request_kind = $1 AND request_id = $2
             ORDER BY logged_at ASC, id ASC",
        )
        .bind(kind.as_str())
        .bind(request_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
