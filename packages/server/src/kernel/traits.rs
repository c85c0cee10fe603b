// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Dispatch decisions live in domains/dispatch and only talk to the outside world
// through these traits, so tests can swap every collaborator.
//
// Naming convention: Base* for trait names (e.g., BaseDispatchStore, BaseGeocoder)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::common::{GeoPoint, PartnerId, RequestId};
use crate::domains::dispatch::models::{
    DispatchAttempt, DispatchRequest, NewDispatchAttempt, Partner, RequestLogEntry,
    RequestStatus, ServiceKind,
};
use crate::domains::presence::PresenceCollection;

// =============================================================================
// Document Store Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseDispatchStore: Send + Sync {
    /// Read the current state of a request
    async fn find_request(&self, kind: ServiceKind, id: RequestId) -> Result<Option<DispatchRequest>>;

    /// All online partners of a kind (women-only eligibility applied when asked)
    async fn find_online_partners(&self, kind: ServiceKind, women_only: bool) -> Result<Vec<Partner>>;

    /// Write a terminal status, guarded: only applies while the request is still
    /// awaiting a partner and unassigned. Returns whether it applied.
    async fn mark_terminal(
        &self,
        kind: ServiceKind,
        id: RequestId,
        status: &RequestStatus,
    ) -> Result<bool>;

    /// Append to `rejected_by`, guarded like `mark_terminal`. Returns the updated
    /// request, or `None` when nothing was written.
    async fn append_rejection(
        &self,
        kind: ServiceKind,
        id: RequestId,
        partner_id: PartnerId,
    ) -> Result<Option<DispatchRequest>>;

    async fn set_location_address(&self, kind: ServiceKind, id: RequestId, address: &str) -> Result<()>;

    async fn record_attempt(&self, attempt: &NewDispatchAttempt) -> Result<DispatchAttempt>;

    async fn count_attempts(&self, kind: ServiceKind, id: RequestId) -> Result<u32>;

    async fn append_log(&self, kind: ServiceKind, id: RequestId, entry: &RequestLogEntry) -> Result<()>;

    /// Batched presence clear for one collection; returns records swept
    async fn sweep_presence(&self, collection: PresenceCollection, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Cheap connectivity probe for health checks
    async fn ping(&self) -> Result<()>;
}

// =============================================================================
// Push Notification Trait (Infrastructure)
// =============================================================================

/// Flat string-keyed payload; every value is serialized to a string
pub type NotificationData = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: NotificationData,
}

/// Per-recipient result of a batch send
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub to: String,
    pub delivered: bool,
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn delivered(to: &str) -> Self {
        Self {
            to: to.to_string(),
            delivered: true,
            error: None,
        }
    }

    pub fn failed(to: &str, error: impl Into<String>) -> Self {
        Self {
            to: to.to_string(),
            delivered: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait BasePushNotificationService: Send + Sync {
    /// Send a single push notification
    async fn send_notification(&self, message: &PushMessage) -> Result<()>;

    /// Send many notifications in one call; reports delivery per recipient
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<DeliveryReport>>;
}

// =============================================================================
// Geocoder Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseGeocoder: Send + Sync {
    /// Resolve coordinates to a human-readable address
    async fn reverse(&self, point: GeoPoint) -> Result<String>;
}

// =============================================================================
// Webhook Trait (Infrastructure - outbound fire-and-forget)
// =============================================================================

#[async_trait]
pub trait BaseWebhookNotifier: Send + Sync {
    /// POST a JSON body describing `event`
    async fn notify(&self, event: &str, payload: serde_json::Value) -> Result<()>;
}
