pub mod strategy;

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::VecDeque;
use tracing::{error, info, instrument, warn};

use crate::common::RequestId;
use crate::domains::dispatch::commands::DispatchCommand;
use crate::domains::dispatch::events::{DispatchOutcome, DispatchTrigger};
use crate::domains::dispatch::machines::RequestLifecycleMachine;
use crate::domains::dispatch::models::{RequestStatus, ServiceKind};
use crate::domains::dispatch::profiles::DispatchProfile;
use crate::kernel::ServerDeps;

pub use strategy::{run_strategy, StrategyRun};

/// Runs triggers through the lifecycle machine and executes its commands
///
/// Rejections written by the engine itself come back as `DispatcherRejected`
/// triggers and are processed in the same call, so a cascade of unreachable
/// partners is worked through without waiting for another change event. If a
/// change feed later delivers the same write as `Updated`, the machine drops it.
#[derive(Clone)]
pub struct DispatchEngine {
    deps: ServerDeps,
    machine: RequestLifecycleMachine,
}

impl DispatchEngine {
    pub fn new(deps: ServerDeps) -> Self {
        Self {
            deps,
            machine: RequestLifecycleMachine::new(),
        }
    }

    pub fn deps(&self) -> &ServerDeps {
        &self.deps
    }

    #[instrument(skip(self, trigger), fields(kind = %trigger.kind(), request_id = %trigger.request_id()))]
    pub async fn handle(&self, trigger: DispatchTrigger) -> Result<Vec<DispatchOutcome>> {
        let mut queue = VecDeque::from([trigger]);
        let mut outcomes = Vec::new();

        while let Some(trigger) = queue.pop_front() {
            for command in self.machine.decide(&trigger, Utc::now()) {
                match command {
                    DispatchCommand::AppendLog {
                        kind,
                        request_id,
                        entry,
                    } => {
                        self.deps
                            .store
                            .append_log(kind, request_id, &entry)
                            .await
                            .context("Failed to append request log entry")?;
                        outcomes.push(DispatchOutcome::Logged {
                            request_id,
                            message: entry.message,
                        });
                    }
                    DispatchCommand::Dispatch { kind, request_id } => {
                        let run = self.dispatch_with_retry(kind, request_id).await;
                        outcomes.extend(run.outcomes);
                        if let Some(follow_up) = run.follow_up {
                            queue.push_back(follow_up);
                        }
                    }
                }
            }
        }

        Ok(outcomes)
    }

    /// Run the strategy, retrying the whole run on store failures
    ///
    /// The strategy only fails before any partner is notified, so a retry never
    /// re-sends to someone already reached.
    /// When retries run out the request is marked `dispatch_error` (guarded, best
    /// effort) so it does not sit in the awaiting state unnoticed.
    async fn dispatch_with_retry(&self, kind: ServiceKind, request_id: RequestId) -> StrategyRun {
        let profile = DispatchProfile::for_kind(kind);
        let policy = &self.deps.policy;
        let mut retry = 0;

        loop {
            match run_strategy(profile, request_id, &self.deps, Utc::now()).await {
                Ok(run) => return run,
                Err(e) if retry < policy.retry_limit => {
                    retry += 1;
                    let delay = policy.backoff_for(retry);
                    warn!(
                        error = %e,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "Dispatch run failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(error = ?e, retries = retry, "Dispatch retries exhausted");

                    let applied = match self
                        .deps
                        .store
                        .mark_terminal(kind, request_id, &RequestStatus::DispatchError)
                        .await
                    {
                        Ok(applied) => applied,
                        Err(write_error) => {
                            error!(error = %write_error, "Failed to mark request as dispatch_error");
                            false
                        }
                    };
                    if applied {
                        info!("Request marked dispatch_error");
                    }

                    return StrategyRun::single(DispatchOutcome::Terminal {
                        request_id,
                        status: RequestStatus::DispatchError,
                        applied,
                    });
                }
            }
        }
    }
}
