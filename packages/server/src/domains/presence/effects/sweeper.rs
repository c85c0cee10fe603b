use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, instrument};

use crate::domains::presence::PresenceCollection;
use crate::kernel::BaseDispatchStore;

/// Default heartbeat staleness before a record is taken offline
pub const DEFAULT_STALE_AFTER_SECS: i64 = 120;

/// What one sweep did, per collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub swept: Vec<(PresenceCollection, u64)>,
    pub failed: Vec<PresenceCollection>,
}

impl SweepReport {
    pub fn total_swept(&self) -> u64 {
        self.swept.iter().map(|(_, n)| n).sum()
    }

    pub fn swept_in(&self, collection: PresenceCollection) -> u64 {
        self.swept
            .iter()
            .find(|(c, _)| *c == collection)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Mark stale online records offline across all presence collections
///
/// A failing collection is logged and skipped; the others are still swept.
#[instrument(skip(store), fields(stale_after_secs = stale_after.num_seconds()))]
pub async fn run_presence_sweep(
    store: &dyn BaseDispatchStore,
    stale_after: Duration,
    now: DateTime<Utc>,
) -> SweepReport {
    let cutoff = now - stale_after;
    let mut report = SweepReport::default();

    for collection in PresenceCollection::ALL {
        match store.sweep_presence(collection, cutoff).await {
            Ok(count) => report.swept.push((collection, count)),
            Err(e) => {
                error!(collection = %collection, error = %e, "Presence sweep failed");
                report.failed.push(collection);
            }
        }
    }

    info!(
        swept = report.total_swept(),
        failed = report.failed.len(),
        "Presence sweep complete"
    );

    report
}
