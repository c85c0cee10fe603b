//! PostgreSQL-backed document store.
//!
//! Thin adapter from `BaseDispatchStore` to the model-level queries; the SQL
//! itself lives next to each model.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::common::{PartnerId, RequestId};
use crate::domains::dispatch::models::{
    DispatchAttempt, DispatchRequest, NewDispatchAttempt, Partner, RequestLogEntry,
    RequestStatus, ServiceKind,
};
use crate::domains::presence::PresenceCollection;
use crate::kernel::BaseDispatchStore;

#[derive(Clone)]
pub struct PostgresDispatchStore {
    pool: PgPool,
}

impl PostgresDispatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BaseDispatchStore for PostgresDispatchStore {
    async fn find_request(&self, kind: ServiceKind, id: RequestId) -> Result<Option<DispatchRequest>> {
        DispatchRequest::find_by_id(kind, id, &self.pool).await
    }

    async fn find_online_partners(&self, kind: ServiceKind, women_only: bool) -> Result<Vec<Partner>> {
        Partner::find_online(kind, women_only, &self.pool).await
    }

    async fn mark_terminal(
        &self,
        kind: ServiceKind,
        id: RequestId,
        status: &RequestStatus,
    ) -> Result<bool> {
        DispatchRequest::mark_terminal(kind, id, status, &self.pool).await
    }

    async fn append_rejection(
        &self,
        kind: ServiceKind,
        id: RequestId,
        partner_id: PartnerId,
    ) -> Result<Option<DispatchRequest>> {
        DispatchRequest::append_rejection(kind, id, partner_id, &self.pool).await
    }

    async fn set_location_address(&self, kind: ServiceKind, id: RequestId, address: &str) -> Result<()> {
        DispatchRequest::set_location_address(kind, id, address, &self.pool).await
    }

    async fn record_attempt(&self, attempt: &NewDispatchAttempt) -> Result<DispatchAttempt> {
        DispatchAttempt::record(attempt, &self.pool).await
    }

    async fn count_attempts(&self, kind: ServiceKind, id: RequestId) -> Result<u32> {
        DispatchAttempt::count_for_request(kind, id, &self.pool).await
    }

    async fn append_log(&self, kind: ServiceKind, id: RequestId, entry: &RequestLogEntry) -> Result<()> {
        RequestLogEntry::append(kind, id, entry, &self.pool).await
    }

    async fn sweep_presence(&self, collection: PresenceCollection, cutoff: DateTime<Utc>) -> Result<u64> {
        collection.sweep_stale(cutoff, &self.pool).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
