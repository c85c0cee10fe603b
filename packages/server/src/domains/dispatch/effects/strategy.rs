//! The dispatch strategy shared by every service kind.
//!
//! Pipeline (one run):
//! 1. Re-read the request; stop unless it is still awaiting and unassigned
//! 2. Stop with `dispatch_exhausted` once the attempt/elapsed bound is reached
//! 3. Reverse-geocode the origin (garage)
//! 4. Locate candidates; none left means a terminal status
//! 5. Take the nearest `candidate_cap`, apply the tokenless policy
//! 6. Re-check dispatchability, then send
//! 7. Failed deliveries become rejections; record the attempt
//!
//! Errors propagate (and the engine retries the run) only while no partner has
//! been notified.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::common::utils::FALLBACK_ADDRESS;
use crate::common::{PartnerId, RequestId};
use crate::domains::dispatch::events::{DispatchOutcome, DispatchTrigger};
use crate::domains::dispatch::models::{
    DispatchRequest, NewDispatchAttempt, RequestStatus, ServiceKind,
};
use crate::domains::dispatch::profiles::{DispatchProfile, TokenlessPolicy};
use crate::domains::dispatch::utils::{locate, Candidate, CandidateQuery};
use crate::kernel::{BaseDispatchStore, DeliveryReport, PushMessage, ServerDeps};

/// Result of one strategy run
#[derive(Debug, Default)]
pub struct StrategyRun {
    pub outcomes: Vec<DispatchOutcome>,
    /// Change caused by rejections this run appended, to be processed like any
    /// other update
    pub follow_up: Option<DispatchTrigger>,
}

impl StrategyRun {
    pub fn single(outcome: DispatchOutcome) -> Self {
        Self {
            outcomes: vec![outcome],
            follow_up: None,
        }
    }
}

fn skipped(request_id: RequestId, reason: impl Into<String>) -> StrategyRun {
    StrategyRun::single(DispatchOutcome::Skipped {
        request_id,
        reason: reason.into(),
    })
}

#[instrument(skip(profile, deps, now), fields(kind = %profile.kind, request_id = %request_id))]
pub async fn run_strategy(
    profile: &DispatchProfile,
    request_id: RequestId,
    deps: &ServerDeps,
    now: DateTime<Utc>,
) -> Result<StrategyRun> {
    let kind = profile.kind;
    let store = deps.store.as_ref();

    // 1. Current state, not the trigger snapshot
    let Some(mut request) = store
        .find_request(kind, request_id)
        .await
        .context("Failed to read request")?
    else {
        warn!("Request not found");
        return Ok(skipped(request_id, "request not found"));
    };

    if !request.is_dispatchable(kind) {
        debug!(status = %request.status, "Request no longer awaiting a partner");
        return Ok(skipped(
            request_id,
            format!("request is {}", request.status),
        ));
    }

    // 2. Re-dispatch bound
    let attempts = store
        .count_attempts(kind, request_id)
        .await
        .context("Failed to count dispatch attempts")?;
    let elapsed = now - request.created_at;
    if attempts >= deps.policy.max_attempts || elapsed > deps.policy.max_elapsed {
        warn!(
            attempts,
            elapsed_secs = elapsed.num_seconds(),
            "Re-dispatch bound reached"
        );
        return write_terminal(store, kind, request_id, RequestStatus::DispatchExhausted).await;
    }

    // 3. Origin address
    if profile.reverse_geocode {
        let address = match deps.geocoder.reverse(request.origin_location).await {
            Ok(address) => address,
            Err(e) => {
                warn!(error = %e, "Reverse geocoding failed, using fallback address");
                FALLBACK_ADDRESS.to_string()
            }
        };
        store
            .set_location_address(kind, request_id, &address)
            .await
            .context("Failed to store location address")?;
        request.location_address = Some(address);
    }

    // 4. Candidates
    let partners = store
        .find_online_partners(kind, request.women_only)
        .await
        .context("Failed to query online partners")?;
    let search = locate(
        &partners,
        &CandidateQuery::for_request(&request, profile.radius_km),
    );
    let empty_status = (profile.empty_status)(&search);

    debug!(
        online = search.online_count,
        previously_rejected = search.previously_rejected,
        candidates = search.candidates.len(),
        "Candidates located"
    );

    if search.candidates.is_empty() {
        record_attempt(store, kind, request_id, Vec::new(), empty_status.as_str()).await;
        return write_terminal(store, kind, request_id, empty_status).await;
    }

    // 5. Nearest first, split by reachability
    let (reachable, tokenless): (Vec<Candidate>, Vec<Candidate>) = search
        .candidates
        .into_iter()
        .take(profile.candidate_cap)
        .partition(|c| c.partner.notification_token().is_some());

    // 6. Guard against an acceptance that landed while we were selecting
    let Some(current) = store
        .find_request(kind, request_id)
        .await
        .context("Failed to re-read request")?
    else {
        return Ok(skipped(request_id, "request not found"));
    };
    if !current.is_dispatchable(kind) {
        info!(status = %current.status, "Request left the awaiting state during selection");
        return Ok(skipped(
            request_id,
            format!("request is {}", current.status),
        ));
    }

    let mut run = StrategyRun::default();
    let mut rejections = Rejections::new(kind, current.clone());

    if reachable.is_empty() {
        let tokenless_ids: Vec<PartnerId> = tokenless.iter().map(|c| c.partner.id).collect();

        match profile.tokenless {
            TokenlessPolicy::Terminal => {
                info!(candidates = tokenless_ids.len(), "No candidate has a push token");
                record_attempt(store, kind, request_id, tokenless_ids, "no_push_token").await;
                return write_terminal(store, kind, request_id, empty_status).await;
            }
            TokenlessPolicy::SyntheticRejection => {
                for partner_id in &tokenless_ids {
                    warn!(partner_id = %partner_id, "Nearest partner has no push token");
                    rejections
                        .append(store, *partner_id, "no push token", &mut run)
                        .await?;
                }
                record_attempt(store, kind, request_id, tokenless_ids, "no_push_token").await;
                run.follow_up = rejections.into_follow_up();
                return Ok(run);
            }
        }
    }

    if !tokenless.is_empty() {
        debug!(skipped = tokenless.len(), "Skipping candidates without push token");
    }

    let messages: Vec<PushMessage> = reachable
        .iter()
        .map(|candidate| build_message(profile, &current, candidate))
        .collect();

    let reports = send(deps, profile, &messages).await;

    // 7. Delivery results
    let mut notified = Vec::new();
    let mut undelivered = Vec::new();
    for (index, candidate) in reachable.iter().enumerate() {
        match reports.get(index) {
            Some(report) if report.delivered => notified.push(candidate.partner.id),
            report => {
                let reason = report
                    .and_then(|r| r.error.clone())
                    .unwrap_or_else(|| "no delivery report".to_string());
                warn!(partner_id = %candidate.partner.id, error = %reason, "Push delivery failed");
                undelivered.push((candidate.partner.id, reason));
            }
        }
    }

    // Once anyone was notified a rerun would reach them twice: store failures
    // here end the bookkeeping, not the run
    for (partner_id, reason) in &undelivered {
        if let Err(e) = rejections.append(store, *partner_id, reason, &mut run).await {
            if notified.is_empty() {
                return Err(e);
            }
            warn!(
                error = ?e,
                notified = notified.len(),
                "Failed to record undelivered partners after notifying others"
            );
            break;
        }
    }

    let outcome = match (notified.len(), reachable.len()) {
        (0, _) => "send_failed",
        (n, total) if n == total => "notified",
        _ => "partially_notified",
    };
    record_attempt(
        store,
        kind,
        request_id,
        reachable.iter().map(|c| c.partner.id).collect(),
        outcome,
    )
    .await;

    if notified.is_empty() {
        run.follow_up = rejections.into_follow_up();
    } else {
        info!(notified = notified.len(), "Partners notified");
        run.outcomes.insert(
            0,
            DispatchOutcome::Notified {
                request_id,
                partner_ids: notified,
            },
        );
    }

    Ok(run)
}

fn build_message(
    profile: &DispatchProfile,
    request: &DispatchRequest,
    candidate: &Candidate,
) -> PushMessage {
    let content = (profile.payload)(request, candidate.distance_km, profile.eta_multiplier);

    PushMessage {
        to: candidate
            .partner
            .notification_token()
            .unwrap_or_default()
            .to_string(),
        title: content.title,
        body: content.body,
        data: content.data,
    }
}

/// One report per message, in message order
async fn send(
    deps: &ServerDeps,
    profile: &DispatchProfile,
    messages: &[PushMessage],
) -> Vec<DeliveryReport> {
    if profile.multicast {
        return match deps.push_service.send_batch(messages).await {
            Ok(reports) => reports,
            Err(e) => {
                warn!(error = %e, recipients = messages.len(), "Batch push failed");
                messages
                    .iter()
                    .map(|m| DeliveryReport::failed(&m.to, e.to_string()))
                    .collect()
            }
        };
    }

    let mut reports = Vec::with_capacity(messages.len());
    for message in messages {
        let report = match deps.push_service.send_notification(message).await {
            Ok(()) => DeliveryReport::delivered(&message.to),
            Err(e) => DeliveryReport::failed(&message.to, e.to_string()),
        };
        reports.push(report);
    }
    reports
}

async fn write_terminal(
    store: &dyn BaseDispatchStore,
    kind: ServiceKind,
    request_id: RequestId,
    status: RequestStatus,
) -> Result<StrategyRun> {
    let applied = store
        .mark_terminal(kind, request_id, &status)
        .await
        .context("Failed to write terminal status")?;

    if applied {
        info!(status = %status, "Terminal status written");
    } else {
        info!(status = %status, "Terminal status not applied, request already moved on");
    }

    Ok(StrategyRun::single(DispatchOutcome::Terminal {
        request_id,
        status,
        applied,
    }))
}

/// Attempt history is observability plus the attempt cap; a failed write is
/// logged and does not fail the run
async fn record_attempt(
    store: &dyn BaseDispatchStore,
    kind: ServiceKind,
    request_id: RequestId,
    partner_ids: Vec<PartnerId>,
    outcome: &str,
) {
    let attempt = NewDispatchAttempt {
        kind,
        request_id,
        partner_ids,
        outcome: outcome.to_string(),
    };

    match store.record_attempt(&attempt).await {
        Ok(recorded) => debug!(attempt_number = recorded.attempt_number, outcome, "Attempt recorded"),
        Err(e) => warn!(error = %e, outcome, "Failed to record dispatch attempt"),
    }
}

/// Synthetic rejections written during one run
struct Rejections {
    kind: ServiceKind,
    before: DispatchRequest,
    after: Option<DispatchRequest>,
}

impl Rejections {
    fn new(kind: ServiceKind, before: DispatchRequest) -> Self {
        Self {
            kind,
            before,
            after: None,
        }
    }

    async fn append(
        &mut self,
        store: &dyn BaseDispatchStore,
        partner_id: PartnerId,
        reason: &str,
        run: &mut StrategyRun,
    ) -> Result<()> {
        let request_id = self.before.id;
        let updated = store
            .append_rejection(self.kind, request_id, partner_id)
            .await
            .context("Failed to append rejection")?;

        match updated {
            Some(updated) => {
                self.after = Some(updated);
                run.outcomes.push(DispatchOutcome::SyntheticRejection {
                    request_id,
                    partner_id,
                    reason: reason.to_string(),
                });
            }
            None => debug!(partner_id = %partner_id, "Rejection not applied, request already moved on"),
        }
        Ok(())
    }

    fn into_follow_up(self) -> Option<DispatchTrigger> {
        let after = self.after?;
        Some(DispatchTrigger::DispatcherRejected {
            kind: self.kind,
            before: self.before,
            after,
        })
    }
}
