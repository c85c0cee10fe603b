//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Currently a single periodic task: the presence sweep, which takes users and
//! partners offline once their heartbeat goes stale.
//!
//! ```text
//! Scheduler (every minute by default)
//!     │
//!     └─► run_presence_sweep()
//!             └─► For each collection → one batched "go offline" write
//! ```

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::presence::run_presence_sweep;
use crate::kernel::ServerDeps;

/// Start all scheduled tasks
pub async fn start_scheduler(
    deps: ServerDeps,
    sweep_schedule: &str,
    stale_after: chrono::Duration,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sweep_job = Job::new_async(sweep_schedule, move |_uuid, _lock| {
        let store = deps.store.clone();
        Box::pin(async move {
            let report = run_presence_sweep(store.as_ref(), stale_after, Utc::now()).await;
            if !report.failed.is_empty() {
                tracing::warn!(
                    failed = ?report.failed,
                    "Presence sweep finished with failing collections"
                );
            }
        })
    })?;

    scheduler.add(sweep_job).await?;
    scheduler.start().await?;

    tracing::info!(
        schedule = %sweep_schedule,
        stale_after_secs = stale_after.num_seconds(),
        "Scheduled tasks started (presence sweep)"
    );
    Ok(scheduler)
}
