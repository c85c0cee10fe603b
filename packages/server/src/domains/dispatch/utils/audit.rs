use crate::common::PartnerId;
use crate::domains::dispatch::models::DispatchRequest;

const SYSTEM_ACTOR: &str = "system";

/// Who caused a status, read from statuses like `cancelled_by_user`
///
/// Everything after the first `_by_`; `system` when there is no such suffix.
pub fn extract_actor(status: &str) -> &str {
    status
        .split_once("_by_")
        .map(|(_, actor)| actor)
        .filter(|actor| !actor.is_empty())
        .unwrap_or(SYSTEM_ACTOR)
}

/// First partner (in insertion order) present in `after` but not in `before`
pub fn first_new_rejection(before: &[PartnerId], after: &[PartnerId]) -> Option<PartnerId> {
    after.iter().find(|id| !before.contains(id)).copied()
}

/// Human-readable log line for an update, or None when nothing worth logging changed
///
/// A status change takes precedence over a rejection.
pub fn compose_audit_message(before: &DispatchRequest, after: &DispatchRequest) -> Option<String> {
    if before.status != after.status {
        return Some(format!(
            "Status changed from {} to {} by {}",
            before.status,
            after.status,
            extract_actor(after.status.as_str())
        ));
    }

    if after.rejected_by.len() > before.rejected_by.len() {
        let partner_id = first_new_rejection(&before.rejected_by, &after.rejected_by)?;
        return Some(format!(
            "Case rejected by partner {}. Re-dispatching.",
            partner_id
        ));
    }

    None
}
