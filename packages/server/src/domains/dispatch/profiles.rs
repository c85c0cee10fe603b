//! Per-kind dispatch parameters.
//!
//! Ride, garage and emergency dispatch run the same strategy; everything that
//! differs between them is captured here.

use crate::domains::dispatch::models::{RequestStatus, ServiceKind};
use crate::domains::dispatch::utils::{
    emergency_notification, garage_notification, ride_notification, CandidateSearch,
    PayloadBuilder,
};

/// What to do when none of the selected candidates has a push token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenlessPolicy {
    /// Write the kind's "nobody available" status
    Terminal,
    /// Record the partner as having rejected, which re-dispatches
    SyntheticRejection,
}

#[derive(Clone, Copy)]
pub struct DispatchProfile {
    pub kind: ServiceKind,
    pub radius_km: Option<f64>,
    /// How many of the nearest candidates to notify per round
    pub candidate_cap: usize,
    pub eta_multiplier: f64,
    /// One batch send to every selected candidate instead of a single send
    pub multicast: bool,
    /// Resolve and store the origin address before looking for candidates
    pub reverse_geocode: bool,
    /// Append audit entries to the request log on updates
    pub audit_log: bool,
    pub tokenless: TokenlessPolicy,
    /// Terminal status when no candidate is left
    pub empty_status: fn(&CandidateSearch) -> RequestStatus,
    pub payload: PayloadBuilder,
}

impl DispatchProfile {
    pub const RIDE: DispatchProfile = DispatchProfile {
        kind: ServiceKind::Ride,
        radius_km: Some(10.0),
        candidate_cap: 3,
        eta_multiplier: 2.0,
        multicast: true,
        reverse_geocode: false,
        audit_log: false,
        tokenless: TokenlessPolicy::Terminal,
        empty_status: no_drivers,
        payload: ride_notification,
    };

    pub const GARAGE: DispatchProfile = DispatchProfile {
        kind: ServiceKind::Garage,
        radius_km: Some(15.0),
        candidate_cap: 1,
        eta_multiplier: 3.0,
        multicast: false,
        reverse_geocode: true,
        audit_log: false,
        tokenless: TokenlessPolicy::SyntheticRejection,
        empty_status: no_mechanics,
        payload: garage_notification,
    };

    pub const EMERGENCY: DispatchProfile = DispatchProfile {
        kind: ServiceKind::Emergency,
        radius_km: None,
        candidate_cap: 1,
        eta_multiplier: 2.0,
        multicast: false,
        reverse_geocode: false,
        audit_log: true,
        tokenless: TokenlessPolicy::SyntheticRejection,
        empty_status: facilities_exhausted,
        payload: emergency_notification,
    };

    pub fn for_kind(kind: ServiceKind) -> &'static DispatchProfile {
        match kind {
            ServiceKind::Ride => &Self::RIDE,
            ServiceKind::Garage => &Self::GARAGE,
            ServiceKind::Emergency => &Self::EMERGENCY,
        }
    }
}

fn no_drivers(_: &CandidateSearch) -> RequestStatus {
    RequestStatus::NoDriversAvailable
}

fn no_mechanics(_: &CandidateSearch) -> RequestStatus {
    RequestStatus::NoMechanicsAvailable
}

/// Busy when facilities were online but all had already rejected the case
fn facilities_exhausted(search: &CandidateSearch) -> RequestStatus {
    if search.previously_rejected > 0 {
        RequestStatus::AllPartnersBusy
    } else {
        RequestStatus::NoPartnersAvailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_match_their_kind() {
        for kind in ServiceKind::ALL {
            assert_eq!(DispatchProfile::for_kind(kind).kind, kind);
        }
    }

    #[test]
    fn test_emergency_empty_status() {
        let busy = CandidateSearch {
            online_count: 2,
            previously_rejected: 2,
            ..Default::default()
        };
        let none = CandidateSearch::default();

        let empty_status = DispatchProfile::EMERGENCY.empty_status;
        assert_eq!(empty_status(&busy), RequestStatus::AllPartnersBusy);
        assert_eq!(empty_status(&none), RequestStatus::NoPartnersAvailable);
    }
}
