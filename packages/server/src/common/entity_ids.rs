//! Typed ID definitions for dispatch entities.
//!
//! Requests of all three kinds (rides, service requests, emergency cases) share
//! `RequestId`; drivers, mechanics and facilities share `PartnerId`.

use super::id::Id;

/// Marker type for request documents (ride, service request, emergency case).
pub struct Request;

/// Marker type for partner documents (driver, mechanic, facility).
pub struct Partner;

/// Marker type for end users (riders, requesters, patients).
pub struct User;

/// Marker type for persisted dispatch attempts.
pub struct DispatchAttempt;

pub type RequestId = Id<Request>;

pub type PartnerId = Id<Partner>;

pub type UserId = Id<User>;

pub type AttemptId = Id<DispatchAttempt>;
