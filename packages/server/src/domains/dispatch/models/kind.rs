use serde::{Deserialize, Serialize};
use std::fmt;

use super::RequestStatus;

/// The three request domains the dispatcher serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Ride hailing: rides → drivers
    Ride,
    /// Roadside assistance (ResQ): service requests → mechanics
    Garage,
    /// Emergency medical dispatch (Cure): emergency cases → facilities
    Emergency,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [Self::Ride, Self::Garage, Self::Emergency];

    /// Table holding this kind's request documents
    pub fn requests_table(&self) -> &'static str {
        match self {
            Self::Ride => "rides",
            Self::Garage => "service_requests",
            Self::Emergency => "emergency_cases",
        }
    }

    /// Table holding the partners eligible for this kind
    pub fn partners_table(&self) -> &'static str {
        match self {
            Self::Ride => "drivers",
            Self::Garage => "mechanics",
            Self::Emergency => "facilities",
        }
    }

    /// Collection name as it appears in change-event URLs
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Ride => "rides",
            Self::Garage => "service-requests",
            Self::Emergency => "emergency-cases",
        }
    }

    pub fn from_collection(collection: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.collection() == collection)
    }

    /// Status a request holds while it is waiting for a partner
    pub fn awaiting_status(&self) -> RequestStatus {
        match self {
            Self::Ride => RequestStatus::Searching,
            Self::Garage | Self::Emergency => RequestStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ride => "ride",
            Self::Garage => "garage",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
