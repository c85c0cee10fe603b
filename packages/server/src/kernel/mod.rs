//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod scheduled_tasks;
pub mod store;
pub mod test_dependencies;
pub mod traits;
pub mod webhook;

pub use deps::ServerDeps;
pub use scheduled_tasks::start_scheduler;
pub use store::PostgresDispatchStore;
pub use test_dependencies::{
    MemoryDispatchStore, MockGeocoder, MockPushNotificationService, MockWebhookNotifier,
    TestDependencies, UserPresence,
};
pub use traits::*;
pub use webhook::{fire_and_forget, HttpWebhookNotifier};
