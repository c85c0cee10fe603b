use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::{RequestStatus, ServiceKind};
use crate::common::{GeoPoint, PartnerId, RequestId, UserId};

/// A ride, service request or emergency case as the dispatcher sees it
///
/// Fields shared by all three kinds are typed; kind-specific fields (addresses,
/// fare, OTP, rider name, issue description, ...) stay in `details` the way the
/// client wrote them and are only read when building notification payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub id: RequestId,
    pub requester_id: UserId,
    pub origin_location: GeoPoint,
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub service_class: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub women_only: bool,
    pub status: RequestStatus,
    /// Append-only, insertion ordered
    #[builder(default)]
    #[serde(default)]
    pub rejected_by: Vec<PartnerId>,
    /// Subset of `rejected_by` the dispatcher appended itself (undeliverable or
    /// tokenless partners). Change events that only add these are its own writes.
    #[builder(default)]
    #[serde(default)]
    pub dispatcher_rejected_by: Vec<PartnerId>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub assigned_partner_id: Option<PartnerId>,
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub location_address: Option<String>,
    #[builder(default = serde_json::json!({}))]
    #[serde(default)]
    pub details: serde_json::Value,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl DispatchRequest {
    /// Awaiting status for its kind and nobody assigned yet
    pub fn is_dispatchable(&self, kind: ServiceKind) -> bool {
        self.status == kind.awaiting_status() && self.assigned_partner_id.is_none()
    }

    pub fn has_rejected(&self, partner_id: PartnerId) -> bool {
        self.rejected_by.contains(&partner_id)
    }

    /// JSON snapshot used for audit log before/after fields
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    requester_id: Uuid,
    origin_lat: f64,
    origin_lng: f64,
    service_class: Option<String>,
    women_only: bool,
    status: String,
    rejected_by: Vec<Uuid>,
    dispatcher_rejected_by: Vec<Uuid>,
    assigned_partner_id: Option<Uuid>,
    location_address: Option<String>,
    details: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl From<RequestRow> for DispatchRequest {
    fn from(row: RequestRow) -> Self {
        Self {
            id: RequestId::from_uuid(row.id),
            requester_id: UserId::from_uuid(row.requester_id),
            origin_location: GeoPoint::new(row.origin_lat, row.origin_lng),
            service_class: row.service_class,
            women_only: row.women_only,
            status: RequestStatus::from(row.status),
            rejected_by: row.rejected_by.into_iter().map(PartnerId::from_uuid).collect(),
            dispatcher_rejected_by: row
                .dispatcher_rejected_by
                .into_iter()
                .map(PartnerId::from_uuid)
                .collect(),
            assigned_partner_id: row.assigned_partner_id.map(PartnerId::from_uuid),
            location_address: row.location_address,
            details: row.details.0,
            created_at: row.created_at,
        }
    }
}

impl DispatchRequest {
    /// Find a request by ID
    pub async fn find_by_id(
        kind: ServiceKind,
        id: RequestId,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT * FROM {} WHERE id = $1",
            kind.requests_table()
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a request document
    pub async fn insert(&self, kind: ServiceKind, pool: &PgPool) -> Result<Self> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "INSERT INTO {} (
                id,
                requester_id,
                origin_lat,
                origin_lng,
                service_class,
                women_only,
                status,
                rejected_by,
                dispatcher_rejected_by,
                assigned_partner_id,
                location_address,
                details,
                created_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING *",
            kind.requests_table()
        ))
        .bind(self.id)
        .bind(self.requester_id)
        .bind(self.origin_location.latitude)
        .bind(self.origin_location.longitude)
        .bind(&self.service_class)
        .bind(self.women_only)
        .bind(self.status.as_str())
        .bind(
            self.rejected_by
                .iter()
                .map(|id| id.into_uuid())
                .collect::<Vec<_>>(),
        )
        .bind(
            self.dispatcher_rejected_by
                .iter()
                .map(|id| id.into_uuid())
                .collect::<Vec<_>>(),
        )
        .bind(self.assigned_partner_id)
        .bind(&self.location_address)
        .bind(Json(&self.details))
        .bind(self.created_at)
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }

    /// Write a terminal status if the request is still awaiting a partner
    ///
    /// Row lock, dispatchability check and write happen in one transaction so a
    /// concurrent acceptance cannot be overwritten. Returns whether the write applied.
    pub async fn mark_terminal(
        kind: ServiceKind,
        id: RequestId,
        status: &RequestStatus,
        pool: &PgPool,
    ) -> Result<bool> {
        let mut tx = pool.begin().await?;

        let current = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT * FROM {} WHERE id = $1 FOR UPDATE",
            kind.requests_table()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .map(DispatchRequest::from);

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(false);
        };

        if !current.is_dispatchable(kind) {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(&format!(
            "UPDATE {} SET status = $2, updated_at = NOW() WHERE id = $1",
            kind.requests_table()
        ))
        .bind(id)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Append a partner to `rejected_by` (and `dispatcher_rejected_by`) if the
    /// request is still awaiting a partner
    ///
    /// Returns the updated document, or `None` when the request left the awaiting
    /// state or already lists the partner.
    pub async fn append_rejection(
        kind: ServiceKind,
        id: RequestId,
        partner_id: PartnerId,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let mut tx = pool.begin().await?;

        let current = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT * FROM {} WHERE id = $1 FOR UPDATE",
            kind.requests_table()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .map(DispatchRequest::from);

        match current {
            Some(current) if current.is_dispatchable(kind) && !current.has_rejected(partner_id) => {}
            _ => {
                tx.rollback().await?;
                return Ok(None);
            }
        }

        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "UPDATE {}
             SET rejected_by = array_append(rejected_by, $2),
                 dispatcher_rejected_by = array_append(dispatcher_rejected_by, $2),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING *",
            kind.requests_table()
        ))
        .bind(id)
        .bind(partner_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    /// Persist the reverse-geocoded origin address
    pub async fn set_location_address(
        kind: ServiceKind,
        id: RequestId,
        address: &str,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE {} SET location_address = $2, updated_at = NOW() WHERE id = $1",
            kind.requests_table()
        ))
        .bind(id)
        .bind(address)
        .execute(pool)
        .await?;

        Ok(())
    }
}
