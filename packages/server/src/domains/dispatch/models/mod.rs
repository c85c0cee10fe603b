pub mod attempt;
pub mod kind;
pub mod log_entry;
pub mod partner;
pub mod request;
pub mod status;

pub use attempt::{DispatchAttempt, NewDispatchAttempt};
pub use kind::ServiceKind;
pub use log_entry::RequestLogEntry;
pub use partner::Partner;
pub use request::DispatchRequest;
pub use status::RequestStatus;
