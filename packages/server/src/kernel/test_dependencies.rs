// TestDependencies - mock implementations for testing
//
// Provides an in-memory document store and mock services that can be injected
// into ServerDeps for tests. The in-memory store applies the same guarded-write
// rules as the Postgres store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    BaseDispatchStore, BaseGeocoder, BasePushNotificationService, BaseWebhookNotifier,
    DeliveryReport, PushMessage, ServerDeps,
};
use crate::common::{AttemptId, GeoPoint, PartnerId, RequestId, UserId};
use crate::domains::dispatch::models::{
    DispatchAttempt, DispatchRequest, NewDispatchAttempt, Partner, RequestLogEntry,
    RequestStatus, ServiceKind,
};
use crate::domains::dispatch::DispatchPolicy;
use crate::domains::presence::PresenceCollection;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// In-memory Document Store
// =============================================================================

/// Presence fields of an end-user record
#[derive(Debug, Clone, PartialEq)]
pub struct UserPresence {
    pub id: UserId,
    pub is_online: bool,
    pub current_location: Option<GeoPoint>,
    pub last_seen: Option<DateTime<Utc>>,
}

type RequestKey = (ServiceKind, RequestId);

pub struct MemoryDispatchStore {
    requests: Mutex<HashMap<RequestKey, DispatchRequest>>,
    partners: Mutex<HashMap<ServiceKind, Vec<Partner>>>,
    users: Mutex<Vec<UserPresence>>,
    attempts: Mutex<Vec<DispatchAttempt>>,
    logs: Mutex<HashMap<RequestKey, Vec<RequestLogEntry>>>,
    /// Number of upcoming store calls that fail
    failures_remaining: Mutex<u32>,
    /// Operations that fail on every call
    failing_operations: Mutex<HashSet<&'static str>>,
    failing_collections: Mutex<HashSet<PresenceCollection>>,
    /// Accept this request (by this partner) the next time partners are read
    accept_on_lookup: Mutex<Option<(RequestKey, PartnerId)>>,
    call_log: Mutex<Vec<&'static str>>,
}

impl MemoryDispatchStore {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            partners: Mutex::new(HashMap::new()),
            users: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            logs: Mutex::new(HashMap::new()),
            failures_remaining: Mutex::new(0),
            failing_operations: Mutex::new(HashSet::new()),
            failing_collections: Mutex::new(HashSet::new()),
            accept_on_lookup: Mutex::new(None),
            call_log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_request(self, kind: ServiceKind, request: DispatchRequest) -> Self {
        self.insert_request(kind, request);
        self
    }

    pub fn with_partner(self, kind: ServiceKind, partner: Partner) -> Self {
        self.insert_partner(kind, partner);
        self
    }

    pub fn with_user(self, user: UserPresence) -> Self {
        lock(&self.users).push(user);
        self
    }

    /// Make the next `count` store calls fail
    pub fn failing_next(self, count: u32) -> Self {
        *lock(&self.failures_remaining) = count;
        self
    }

    /// Make every call to this store operation fail
    pub fn failing_on(self, operation: &'static str) -> Self {
        lock(&self.failing_operations).insert(operation);
        self
    }

    /// Make every sweep of this collection fail
    pub fn failing_sweep_of(self, collection: PresenceCollection) -> Self {
        lock(&self.failing_collections).insert(collection);
        self
    }

    /// Simulate a partner accepting between candidate lookup and send
    pub fn accepting_during_lookup(
        self,
        kind: ServiceKind,
        request_id: RequestId,
        partner_id: PartnerId,
    ) -> Self {
        *lock(&self.accept_on_lookup) = Some(((kind, request_id), partner_id));
        self
    }

    pub fn insert_request(&self, kind: ServiceKind, request: DispatchRequest) {
        lock(&self.requests).insert((kind, request.id), request);
    }

    pub fn insert_partner(&self, kind: ServiceKind, partner: Partner) {
        lock(&self.partners).entry(kind).or_default().push(partner);
    }

    /// Overwrite a request the way another actor (partner app, admin) would
    pub fn update_request(
        &self,
        kind: ServiceKind,
        id: RequestId,
        change: impl FnOnce(&mut DispatchRequest),
    ) -> Option<DispatchRequest> {
        let mut requests = lock(&self.requests);
        let request = requests.get_mut(&(kind, id))?;
        change(request);
        Some(request.clone())
    }

    pub fn request(&self, kind: ServiceKind, id: RequestId) -> Option<DispatchRequest> {
        lock(&self.requests).get(&(kind, id)).cloned()
    }

    pub fn partners(&self, kind: ServiceKind) -> Vec<Partner> {
        lock(&self.partners).get(&kind).cloned().unwrap_or_default()
    }

    pub fn users(&self) -> Vec<UserPresence> {
        lock(&self.users).clone()
    }

    pub fn attempts(&self, kind: ServiceKind, id: RequestId) -> Vec<DispatchAttempt> {
        lock(&self.attempts)
            .iter()
            .filter(|a| a.kind == kind && a.request_id == id)
            .cloned()
            .collect()
    }

    pub fn logs(&self, kind: ServiceKind, id: RequestId) -> Vec<RequestLogEntry> {
        lock(&self.logs).get(&(kind, id)).cloned().unwrap_or_default()
    }

    /// Names of store operations called, in order
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.call_log).clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.call_log).iter().filter(|c| **c == operation).count()
    }

    fn enter(&self, operation: &'static str) -> Result<()> {
        lock(&self.call_log).push(operation);

        if lock(&self.failing_operations).contains(operation) {
            anyhow::bail!("injected store failure in {}", operation);
        }

        let mut remaining = lock(&self.failures_remaining);
        if *remaining > 0 {
            *remaining -= 1;
            anyhow::bail!("injected store failure in {}", operation);
        }
        Ok(())
    }
}

impl Default for MemoryDispatchStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseDispatchStore for MemoryDispatchStore {
    async fn find_request(&self, kind: ServiceKind, id: RequestId) -> Result<Option<DispatchRequest>> {
        self.enter("find_request")?;
        Ok(self.request(kind, id))
    }

    async fn find_online_partners(&self, kind: ServiceKind, women_only: bool) -> Result<Vec<Partner>> {
        self.enter("find_online_partners")?;

        if let Some((key, partner_id)) = lock(&self.accept_on_lookup).take() {
            if let Some(request) = lock(&self.requests).get_mut(&key) {
                request.status = RequestStatus::Accepted;
                request.assigned_partner_id = Some(partner_id);
            }
        }

        Ok(self
            .partners(kind)
            .into_iter()
            .filter(|p| p.is_online)
            .filter(|p| !women_only || p.is_women_only_eligible())
            .collect())
    }

    async fn mark_terminal(
        &self,
        kind: ServiceKind,
        id: RequestId,
        status: &RequestStatus,
    ) -> Result<bool> {
        self.enter("mark_terminal")?;

        let mut requests = lock(&self.requests);
        match requests.get_mut(&(kind, id)) {
            Some(request) if request.is_dispatchable(kind) => {
                request.status = status.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_rejection(
        &self,
        kind: ServiceKind,
        id: RequestId,
        partner_id: PartnerId,
    ) -> Result<Option<DispatchRequest>> {
        self.enter("append_rejection")?;

        let mut requests = lock(&self.requests);
        match requests.get_mut(&(kind, id)) {
            Some(request) if request.is_dispatchable(kind) && !request.has_rejected(partner_id) => {
                request.rejected_by.push(partner_id);
                request.dispatcher_rejected_by.push(partner_id);
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_location_address(&self, kind: ServiceKind, id: RequestId, address: &str) -> Result<()> {
        self.enter("set_location_address")?;

        if let Some(request) = lock(&self.requests).get_mut(&(kind, id)) {
            request.location_address = Some(address.to_string());
        }
        Ok(())
    }

    async fn record_attempt(&self, attempt: &NewDispatchAttempt) -> Result<DispatchAttempt> {
        self.enter("record_attempt")?;

        let mut attempts = lock(&self.attempts);
        let previous = attempts
            .iter()
            .filter(|a| a.kind == attempt.kind && a.request_id == attempt.request_id)
            .count();

        let recorded = DispatchAttempt {
            id: AttemptId::new(),
            kind: attempt.kind,
            request_id: attempt.request_id,
            attempt_number: previous as i32 + 1,
            partner_ids: attempt.partner_ids.clone(),
            outcome: attempt.outcome.clone(),
            created_at: Utc::now(),
        };
        attempts.push(recorded.clone());
        Ok(recorded)
    }

    async fn count_attempts(&self, kind: ServiceKind, id: RequestId) -> Result<u32> {
        self.enter("count_attempts")?;
        Ok(self.attempts(kind, id).len() as u32)
    }

    async fn append_log(&self, kind: ServiceKind, id: RequestId, entry: &RequestLogEntry) -> Result<()> {
        self.enter("append_log")?;
        lock(&self.logs).entry((kind, id)).or_default().push(entry.clone());
        Ok(())
    }

    async fn sweep_presence(&self, collection: PresenceCollection, cutoff: DateTime<Utc>) -> Result<u64> {
        if lock(&self.failing_collections).contains(&collection) {
            anyhow::bail!("injected sweep failure for {}", collection);
        }
        self.enter("sweep_presence")?;

        // No heartbeat at all is not stale, matching `last_seen < $1` in SQL
        let is_stale = |online: bool, last_seen: Option<DateTime<Utc>>| {
            online && last_seen.is_some_and(|seen| seen < cutoff)
        };

        let mut swept = 0;
        match collection.partner_kind() {
            None => {
                for user in lock(&self.users).iter_mut() {
                    if is_stale(user.is_online, user.last_seen) {
                        user.is_online = false;
                        user.current_location = None;
                        swept += 1;
                    }
                }
            }
            Some(kind) => {
                let mut partners = lock(&self.partners);
                for partner in partners.entry(kind).or_default().iter_mut() {
                    if is_stale(partner.is_online, partner.last_seen) {
                        partner.is_online = false;
                        partner.current_location = None;
                        swept += 1;
                    }
                }
            }
        }
        Ok(swept)
    }

    async fn ping(&self) -> Result<()> {
        self.enter("ping")
    }
}

// =============================================================================
// Mock Push Notification Service
// =============================================================================

pub struct MockPushNotificationService {
    sent: Mutex<Vec<PushMessage>>,
    failing_tokens: Mutex<HashSet<String>>,
    unavailable: Mutex<bool>,
    single_sends: Mutex<usize>,
    batch_sends: Mutex<usize>,
}

impl MockPushNotificationService {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing_tokens: Mutex::new(HashSet::new()),
            unavailable: Mutex::new(false),
            single_sends: Mutex::new(0),
            batch_sends: Mutex::new(0),
        }
    }

    /// Deliveries to this token fail
    pub fn failing_token(self, token: &str) -> Self {
        lock(&self.failing_tokens).insert(token.to_string());
        self
    }

    /// Every call fails outright
    pub fn unavailable(self) -> Self {
        *lock(&self.unavailable) = true;
        self
    }

    /// Messages that were accepted for delivery
    pub fn sent_notifications(&self) -> Vec<PushMessage> {
        lock(&self.sent).clone()
    }

    pub fn sent_to(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|m| m.to.clone()).collect()
    }

    pub fn was_sent_with_title(&self, title: &str) -> bool {
        lock(&self.sent).iter().any(|m| m.title == title)
    }

    pub fn single_send_count(&self) -> usize {
        *lock(&self.single_sends)
    }

    pub fn batch_send_count(&self) -> usize {
        *lock(&self.batch_sends)
    }

    fn deliver(&self, message: &PushMessage) -> DeliveryReport {
        if lock(&self.failing_tokens).contains(&message.to) {
            return DeliveryReport::failed(&message.to, "DeviceNotRegistered");
        }
        lock(&self.sent).push(message.clone());
        DeliveryReport::delivered(&message.to)
    }
}

impl Default for MockPushNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BasePushNotificationService for MockPushNotificationService {
    async fn send_notification(&self, message: &PushMessage) -> Result<()> {
        *lock(&self.single_sends) += 1;
        if *lock(&self.unavailable) {
            anyhow::bail!("push service unavailable");
        }

        let report = self.deliver(message);
        match report.error {
            Some(error) => anyhow::bail!("push to {} failed: {}", report.to, error),
            None => Ok(()),
        }
    }

    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<DeliveryReport>> {
        *lock(&self.batch_sends) += 1;
        if *lock(&self.unavailable) {
            anyhow::bail!("push service unavailable");
        }

        Ok(messages.iter().map(|m| self.deliver(m)).collect())
    }
}

// =============================================================================
// Mock Geocoder
// =============================================================================

pub struct MockGeocoder {
    address: Option<String>,
    calls: Mutex<Vec<GeoPoint>>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::with_address("221B Baker Street, London")
    }

    pub fn with_address(address: &str) -> Self {
        Self {
            address: Some(address.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every lookup fails
    pub fn failing() -> Self {
        Self {
            address: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GeoPoint> {
        lock(&self.calls).clone()
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseGeocoder for MockGeocoder {
    async fn reverse(&self, point: GeoPoint) -> Result<String> {
        lock(&self.calls).push(point);
        match &self.address {
            Some(address) => Ok(address.clone()),
            None => anyhow::bail!("geocoder unavailable"),
        }
    }
}

// =============================================================================
// Mock Webhook Notifier
// =============================================================================

pub struct MockWebhookNotifier {
    calls: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MockWebhookNotifier {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        lock(&self.calls).clone()
    }

    pub fn was_notified(&self, event: &str) -> bool {
        lock(&self.calls).iter().any(|(e, _)| e == event)
    }
}

impl Default for MockWebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseWebhookNotifier for MockWebhookNotifier {
    async fn notify(&self, event: &str, payload: serde_json::Value) -> Result<()> {
        lock(&self.calls).push((event.to_string(), payload));
        Ok(())
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<MemoryDispatchStore>,
    pub push_service: Arc<MockPushNotificationService>,
    pub geocoder: Arc<MockGeocoder>,
    pub webhook: Arc<MockWebhookNotifier>,
    pub policy: DispatchPolicy,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryDispatchStore::new()),
            push_service: Arc::new(MockPushNotificationService::new()),
            geocoder: Arc::new(MockGeocoder::new()),
            webhook: Arc::new(MockWebhookNotifier::new()),
            policy: DispatchPolicy {
                retry_backoff: std::time::Duration::ZERO,
                ..DispatchPolicy::default()
            },
        }
    }

    /// Set the in-memory store
    pub fn mock_store(mut self, store: MemoryDispatchStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Set a mock push notification service
    pub fn mock_push(mut self, service: MockPushNotificationService) -> Self {
        self.push_service = Arc::new(service);
        self
    }

    /// Set a mock geocoder
    pub fn mock_geocoder(mut self, geocoder: MockGeocoder) -> Self {
        self.geocoder = Arc::new(geocoder);
        self
    }

    pub fn policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Convert into ServerDeps, keeping handles on the mocks for assertions
    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.store.clone(),
            self.push_service.clone(),
            self.geocoder.clone(),
            self.webhook.clone(),
            self.policy.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
