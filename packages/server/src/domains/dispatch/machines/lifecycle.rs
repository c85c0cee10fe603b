use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domains::dispatch::commands::DispatchCommand;
use crate::domains::dispatch::events::DispatchTrigger;
use crate::domains::dispatch::models::{DispatchRequest, RequestLogEntry, ServiceKind};
use crate::domains::dispatch::profiles::DispatchProfile;
use crate::domains::dispatch::utils::compose_audit_message;

/// Decides what a request change means for dispatch
///
/// Pure: reads the trigger snapshots only. The strategy re-reads the store
/// before acting, so a stale snapshot can at worst cause a no-op run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLifecycleMachine;

impl RequestLifecycleMachine {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, trigger: &DispatchTrigger, now: DateTime<Utc>) -> Vec<DispatchCommand> {
        match trigger {
            DispatchTrigger::Created { kind, request } => {
                if request.status == kind.awaiting_status() {
                    info!(kind = %kind, request_id = %request.id, "New request, dispatching");
                    vec![DispatchCommand::Dispatch {
                        kind: *kind,
                        request_id: request.id,
                    }]
                } else {
                    debug!(
                        kind = %kind,
                        request_id = %request.id,
                        status = %request.status,
                        "Created outside the awaiting state, ignoring"
                    );
                    Vec::new()
                }
            }

            DispatchTrigger::Updated {
                kind,
                before,
                after,
            } => {
                if echoes_dispatcher_rejection(before, after) {
                    debug!(
                        kind = %kind,
                        request_id = %after.id,
                        "Update only carries rejections the dispatcher wrote, ignoring"
                    );
                    return Vec::new();
                }
                self.on_change(*kind, before, after, now)
            }

            DispatchTrigger::DispatcherRejected {
                kind,
                before,
                after,
            } => self.on_change(*kind, before, after, now),
        }
    }

    fn on_change(
        &self,
        kind: ServiceKind,
        before: &DispatchRequest,
        after: &DispatchRequest,
        now: DateTime<Utc>,
    ) -> Vec<DispatchCommand> {
        let mut commands = Vec::new();

        if DispatchProfile::for_kind(kind).audit_log {
            if let Some(message) = compose_audit_message(before, after) {
                commands.push(DispatchCommand::AppendLog {
                    kind,
                    request_id: after.id,
                    entry: RequestLogEntry {
                        timestamp: now,
                        message,
                        before: before.snapshot(),
                        after: after.snapshot(),
                    },
                });
            }
        }

        let rejections_grew = after.rejected_by.len() > before.rejected_by.len();
        if rejections_grew && after.status == kind.awaiting_status() {
            info!(
                kind = %kind,
                request_id = %after.id,
                rejections = after.rejected_by.len(),
                "Rejected while awaiting, re-dispatching"
            );
            commands.push(DispatchCommand::Dispatch {
                kind,
                request_id: after.id,
            });
        } else {
            debug!(kind = %kind, request_id = %after.id, "Update needs no dispatch");
        }

        commands
    }
}

/// True when the change adds rejections and every one of them was appended by
/// the dispatcher, with nothing else changing status. Those writes were already
/// handled in-process when they were made.
fn echoes_dispatcher_rejection(before: &DispatchRequest, after: &DispatchRequest) -> bool {
    let mut added = after
        .rejected_by
        .iter()
        .filter(|id| !before.has_rejected(**id))
        .peekable();

    added.peek().is_some()
        && before.status == after.status
        && added.all(|id| after.dispatcher_rejected_by.contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{GeoPoint, PartnerId, RequestId, UserId};
    use crate::domains::dispatch::models::RequestStatus;

    fn request(status: RequestStatus, rejected_by: Vec<PartnerId>) -> DispatchRequest {
        DispatchRequest::builder()
            .id(RequestId::new())
            .requester_id(UserId::new())
            .origin_location(GeoPoint::new(28.6, 77.2))
            .status(status)
            .rejected_by(rejected_by)
            .build()
    }

    fn updated(kind: ServiceKind, before: &DispatchRequest, change: impl FnOnce(&mut DispatchRequest)) -> DispatchTrigger {
        let mut after = before.clone();
        change(&mut after);
        DispatchTrigger::Updated {
            kind,
            before: before.clone(),
            after,
        }
    }

    #[test]
    fn test_create_dispatches_only_awaiting_requests() {
        let machine = RequestLifecycleMachine::new();
        let searching = request(RequestStatus::Searching, vec![]);
        let accepted = request(RequestStatus::Accepted, vec![]);

        let commands = machine.decide(
            &DispatchTrigger::Created {
                kind: ServiceKind::Ride,
                request: searching.clone(),
            },
            Utc::now(),
        );
        assert_eq!(
            commands,
            vec![DispatchCommand::Dispatch {
                kind: ServiceKind::Ride,
                request_id: searching.id,
            }]
        );

        let commands = machine.decide(
            &DispatchTrigger::Created {
                kind: ServiceKind::Ride,
                request: accepted,
            },
            Utc::now(),
        );
        assert!(commands.is_empty());
    }

    #[test]
    fn test_unchanged_rejections_are_a_noop() {
        let machine = RequestLifecycleMachine::new();
        let before = request(RequestStatus::Pending, vec![PartnerId::new()]);
        let trigger = updated(ServiceKind::Garage, &before, |r| {
            r.details = serde_json::json!({"note": "edited"});
        });

        assert!(machine.decide(&trigger, Utc::now()).is_empty());
    }

    #[test]
    fn test_rejection_while_awaiting_redispatches() {
        let machine = RequestLifecycleMachine::new();
        let before = request(RequestStatus::Pending, vec![]);
        let trigger = updated(ServiceKind::Garage, &before, |r| r.rejected_by.push(PartnerId::new()));

        let commands = machine.decide(&trigger, Utc::now());

        assert_eq!(
            commands,
            vec![DispatchCommand::Dispatch {
                kind: ServiceKind::Garage,
                request_id: before.id,
            }]
        );
    }

    #[test]
    fn test_rejection_after_terminal_does_not_redispatch() {
        let machine = RequestLifecycleMachine::new();
        let before = request(RequestStatus::Searching, vec![]);
        let trigger = updated(ServiceKind::Ride, &before, |r| {
            r.rejected_by.push(PartnerId::new());
            r.status = RequestStatus::NoDriversAvailable;
        });

        assert!(machine.decide(&trigger, Utc::now()).is_empty());
    }

    #[test]
    fn test_emergency_update_logs_before_dispatch() {
        let machine = RequestLifecycleMachine::new();
        let before = request(RequestStatus::Pending, vec![]);
        let rejecting = PartnerId::new();
        let trigger = updated(ServiceKind::Emergency, &before, |r| r.rejected_by.push(rejecting));

        let commands = machine.decide(&trigger, Utc::now());

        assert_eq!(commands.len(), 2);
        match &commands[0] {
            DispatchCommand::AppendLog { entry, .. } => {
                assert_eq!(
                    entry.message,
                    format!("Case rejected by partner {}. Re-dispatching.", rejecting)
                );
                assert_eq!(entry.before["rejectedBy"], serde_json::json!([]));
            }
            other => panic!("expected a log entry first, got {:?}", other),
        }
        assert!(matches!(commands[1], DispatchCommand::Dispatch { .. }));
    }

    #[test]
    fn test_ride_updates_are_not_audited() {
        let machine = RequestLifecycleMachine::new();
        let before = request(RequestStatus::Searching, vec![]);
        let trigger = updated(ServiceKind::Ride, &before, |r| r.status = RequestStatus::Accepted);

        assert!(machine.decide(&trigger, Utc::now()).is_empty());
    }

    #[test]
    fn test_echo_of_dispatcher_rejection_is_ignored() {
        let machine = RequestLifecycleMachine::new();
        let before = request(RequestStatus::Pending, vec![]);
        let tokenless = PartnerId::new();
        let echoed = updated(ServiceKind::Emergency, &before, |r| {
            r.rejected_by.push(tokenless);
            r.dispatcher_rejected_by.push(tokenless);
        });
        assert!(machine.decide(&echoed, Utc::now()).is_empty());

        // The in-process copy of the same write is acted on
        let DispatchTrigger::Updated { before, after, .. } = echoed else {
            unreachable!()
        };
        let own = DispatchTrigger::DispatcherRejected {
            kind: ServiceKind::Emergency,
            before,
            after,
        };
        let commands = machine.decide(&own, Utc::now());
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[1], DispatchCommand::Dispatch { .. }));
    }

    #[test]
    fn test_partner_rejection_alongside_dispatcher_one_still_redispatches() {
        let machine = RequestLifecycleMachine::new();
        let before = request(RequestStatus::Pending, vec![]);
        let tokenless = PartnerId::new();
        let declined = PartnerId::new();
        let trigger = updated(ServiceKind::Garage, &before, |r| {
            r.rejected_by.extend([tokenless, declined]);
            r.dispatcher_rejected_by.push(tokenless);
        });

        assert_eq!(
            machine.decide(&trigger, Utc::now()),
            vec![DispatchCommand::Dispatch {
                kind: ServiceKind::Garage,
                request_id: before.id,
            }]
        );
    }
}
