use serde::{Deserialize, Serialize};
use std::fmt;

/// Request status as stored on the document
///
/// Statuses are open-ended strings written by several actors (partner apps, admin
/// tools, the dispatcher). The variants below are the ones the dispatcher reads or
/// writes; anything else round-trips through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestStatus {
    /// Ride awaiting a driver
    Searching,
    /// Service request / emergency case awaiting a partner
    Pending,
    Accepted,
    NoDriversAvailable,
    NoMechanicsAvailable,
    NoPartnersAvailable,
    AllPartnersBusy,
    /// Re-dispatch bound reached (attempt count or elapsed time)
    DispatchExhausted,
    /// Store failures outlasted the retry budget
    DispatchError,
    Other(String),
}

impl RequestStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Searching => "searching",
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::NoDriversAvailable => "no_drivers_available",
            Self::NoMechanicsAvailable => "no_mechanics_available",
            Self::NoPartnersAvailable => "no_partners_available",
            Self::AllPartnersBusy => "all_partners_busy",
            Self::DispatchExhausted => "dispatch_exhausted",
            Self::DispatchError => "dispatch_error",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for RequestStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "searching" => Self::Searching,
            "pending" => Self::Pending,
            "accepted" => Self::Accepted,
            "no_drivers_available" => Self::NoDriversAvailable,
            "no_mechanics_available" => Self::NoMechanicsAvailable,
            "no_partners_available" => Self::NoPartnersAvailable,
            "all_partners_busy" => Self::AllPartnersBusy,
            "dispatch_exhausted" => Self::DispatchExhausted,
            "dispatch_error" => Self::DispatchError,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for RequestStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<RequestStatus> for String {
    fn from(status: RequestStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses_parse_to_variants() {
        assert_eq!(RequestStatus::from("searching"), RequestStatus::Searching);
        assert_eq!(
            RequestStatus::from("all_partners_busy"),
            RequestStatus::AllPartnersBusy
        );
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let status = RequestStatus::from("cancelled_by_user");
        assert_eq!(status, RequestStatus::Other("cancelled_by_user".to_string()));
        assert_eq!(status.as_str(), "cancelled_by_user");
    }

    #[test]
    fn test_serde_uses_plain_strings() {
        let json = serde_json::to_string(&RequestStatus::NoMechanicsAvailable).unwrap();
        assert_eq!(json, "\"no_mechanics_available\"");

        let parsed: RequestStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, RequestStatus::Pending);
    }
}
