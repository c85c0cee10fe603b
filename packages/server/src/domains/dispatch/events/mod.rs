use serde::Serialize;

use crate::common::{PartnerId, RequestId};
use crate::domains::dispatch::models::{DispatchRequest, RequestStatus, ServiceKind};

/// Change events that drive the request lifecycle
#[derive(Debug, Clone)]
pub enum DispatchTrigger {
    /// A request document was created
    Created {
        kind: ServiceKind,
        request: DispatchRequest,
    },
    /// A request document changed; both snapshots are carried
    Updated {
        kind: ServiceKind,
        before: DispatchRequest,
        after: DispatchRequest,
    },
    /// Rejections the engine appended during a run, fed back in-process.
    /// The same write arriving later as an `Updated` event is ignored.
    DispatcherRejected {
        kind: ServiceKind,
        before: DispatchRequest,
        after: DispatchRequest,
    },
}

impl DispatchTrigger {
    pub fn kind(&self) -> ServiceKind {
        match self {
            Self::Created { kind, .. }
            | Self::Updated { kind, .. }
            | Self::DispatcherRejected { kind, .. } => *kind,
        }
    }

    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Created { request, .. } => request.id,
            Self::Updated { after, .. } | Self::DispatcherRejected { after, .. } => after.id,
        }
    }
}

/// What one trigger led to (fact events)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Push notifications accepted for these partners
    Notified {
        request_id: RequestId,
        partner_ids: Vec<PartnerId>,
    },
    /// A terminal status write was attempted; `applied` is false when the request
    /// had already left the awaiting state
    Terminal {
        request_id: RequestId,
        status: RequestStatus,
        applied: bool,
    },
    /// The engine appended a partner to `rejected_by` on their behalf
    SyntheticRejection {
        request_id: RequestId,
        partner_id: PartnerId,
        reason: String,
    },
    /// Nothing to do
    Skipped {
        request_id: RequestId,
        reason: String,
    },
    /// An audit entry was appended to the request log
    Logged {
        request_id: RequestId,
        message: String,
    },
}
