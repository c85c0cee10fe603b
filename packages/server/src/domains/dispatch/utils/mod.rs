pub mod audit;
pub mod candidates;
pub mod payload;

pub use audit::{compose_audit_message, extract_actor, first_new_rejection};
pub use candidates::{locate, Candidate, CandidateQuery, CandidateSearch};
pub use payload::{
    emergency_notification, garage_notification, ride_notification, NotificationContent,
    PayloadBuilder,
};
