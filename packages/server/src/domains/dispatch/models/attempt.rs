use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::ServiceKind;
use crate::common::{AttemptId, PartnerId, RequestId};

/// One strategy run that reached candidate selection
///
/// The attempt count per request drives the re-dispatch bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchAttempt {
    pub id: AttemptId,
    pub kind: ServiceKind,
    pub request_id: RequestId,
    pub attempt_number: i32,
    pub partner_ids: Vec<PartnerId>,
    pub outcome: String,
    pub created_at: DateTime<Utc>,
}

/// Attempt data before it gets a number and a timestamp
#[derive(Debug, Clone)]
pub struct NewDispatchAttempt {
    pub kind: ServiceKind,
    pub request_id: RequestId,
    pub partner_ids: Vec<PartnerId>,
    pub outcome: String,
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: Uuid,
    request_id: Uuid,
    attempt_number: i32,
    partner_ids: Vec<Uuid>,
    outcome: String,
    created_at: DateTime<Utc>,
}

impl AttemptRow {
    fn into_attempt(self, kind: ServiceKind) -> DispatchAttempt {
        DispatchAttempt {
            id: AttemptId::from_uuid(self.id),
            kind,
            request_id: RequestId::from_uuid(self.request_id),
            attempt_number: self.attempt_number,
            partner_ids: self.partner_ids.into_iter().map(PartnerId::from_uuid).collect(),
            outcome: self.outcome,
            created_at: self.created_at,
        }
    }
}

impl DispatchAttempt {
    /// Record an attempt, numbering it after the request's previous attempts
    pub async fn record(attempt: &NewDispatchAttempt, pool: &PgPool) -> Result<Self> {
        let row = sqlx::query_as::<_, AttemptRow>(
            "INSERT INTO dispatch_attempts (id, request_kind, request_id, attempt_number, partner_ids, outcome)
             VALUES (
                $1, $2, $3,
                (SELECT COALESCE(MAX(attempt_number), 0) + 1
                   FROM dispatch_attempts
                  WHERE request_kind = $2 AND request_id = $3),
                $4, $5
             )
             RETURNING id, request_id, attempt_number, partner_ids, outcome, created_at",
        )
        .bind(AttemptId::new())
        .bind(attempt.kind.as_str())
        .bind(attempt.request_id)
        .bind(
            attempt
                .partner_ids
                .iter()
                .map(|id| id.into_uuid())
                .collect::<Vec<_>>(),
        )
        .bind(&attempt.outcome)
        .fetch_one(pool)
        .await?;

        Ok(row.into_attempt(attempt.kind))
    }

    /// Count attempts recorded for a request
    pub async fn count_for_request(
        kind: ServiceKind,
        request_id: RequestId,
        pool: &PgPool,
    ) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM dispatch_attempts WHERE request_kind = $1 AND request_id = $2",
        )
        .bind(kind.as_str())
        .bind(request_id)
        .fetch_one(pool)
        .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// All attempts for a request, oldest first
    pub async fn find_by_request(
        kind: ServiceKind,
        request_id: RequestId,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            "SELECT id, request_id, attempt_number, partner_ids, outcome, created_at
             FROM dispatch_attempts
             WHERE request_kind = $1 AND request_id = $2
             ORDER BY attempt_number ASC",
        )
        .bind(kind.as_str())
        .bind(request_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.into_attempt(kind)).collect())
    }
}
