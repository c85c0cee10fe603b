use crate::common::RequestId;
use crate::domains::dispatch::models::{RequestLogEntry, ServiceKind};

/// Dispatch domain commands
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchCommand {
    /// Run the kind's dispatch strategy against the current request state
    Dispatch {
        kind: ServiceKind,
        request_id: RequestId,
    },
    /// Append an audit entry to the request log
    AppendLog {
        kind: ServiceKind,
        request_id: RequestId,
        entry: RequestLogEntry,
    },
}
