//! Server dependencies for effects (using traits for testability)
//!
//! This module provides the central dependency container handed to the dispatch
//! engine, the presence sweeper and the HTTP routes. Every external service sits
//! behind a trait so tests can inject mocks; nothing is a process-wide singleton.

use sqlx::PgPool;
use std::sync::Arc;

use crate::common::utils::{ExpoClient, NominatimGeocoder};
use crate::config::Config;
use crate::domains::dispatch::DispatchPolicy;
use crate::kernel::{
    BaseDispatchStore, BaseGeocoder, BasePushNotificationService, BaseWebhookNotifier,
    HttpWebhookNotifier, PostgresDispatchStore,
};

/// Server dependencies accessible to effects
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseDispatchStore>,
    pub push_service: Arc<dyn BasePushNotificationService>,
    pub geocoder: Arc<dyn BaseGeocoder>,
    pub webhook: Arc<dyn BaseWebhookNotifier>,
    pub policy: DispatchPolicy,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    pub fn new(
        store: Arc<dyn BaseDispatchStore>,
        push_service: Arc<dyn BasePushNotificationService>,
        geocoder: Arc<dyn BaseGeocoder>,
        webhook: Arc<dyn BaseWebhookNotifier>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            store,
            push_service,
            geocoder,
            webhook,
            policy,
        }
    }

    /// Production wiring: Postgres store, Expo push, Nominatim, HTTP webhooks
    pub fn from_config(pool: PgPool, config: &Config) -> Self {
        Self::new(
            Arc::new(PostgresDispatchStore::new(pool)),
            Arc::new(ExpoClient::new(config.expo_access_token.clone())),
            Arc::new(NominatimGeocoder::new(config.nominatim_url.clone())),
            Arc::new(HttpWebhookNotifier::new(config.webhook_url.clone())),
            config.dispatch_policy(),
        )
    }
}
