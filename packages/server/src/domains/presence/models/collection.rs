use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;

use crate::domains::dispatch::models::ServiceKind;

/// Collections carrying presence fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceCollection {
    Users,
    Drivers,
    Mechanics,
    Facilities,
}

impl PresenceCollection {
    pub const ALL: [PresenceCollection; 4] = [
        Self::Users,
        Self::Drivers,
        Self::Mechanics,
        Self::Facilities,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Drivers => "drivers",
            Self::Mechanics => "mechanics",
            Self::Facilities => "facilities",
        }
    }

    /// Dispatch kind whose candidates live in this collection (none for users)
    pub fn partner_kind(&self) -> Option<ServiceKind> {
        match self {
            Self::Users => None,
            Self::Drivers => Some(ServiceKind::Ride),
            Self::Mechanics => Some(ServiceKind::Garage),
            Self::Facilities => Some(ServiceKind::Emergency),
        }
    }

    /// Take every online record with `last_seen` before the cutoff offline
    ///
    /// One batched UPDATE per collection; also clears the last known location.
    /// Records that never sent a heartbeat (`last_seen IS NULL`) are left alone.
    /// Returns the number of records swept.
    pub async fn sweep_stale(&self, cutoff: DateTime<Utc>, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(&format!(
            "UPDATE {}
             SET is_online = false, current_lat = NULL, current_lng = NULL
             WHERE is_online = true AND last_seen < $1",
            self.table()
        ))
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

impl fmt::Display for PresenceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}
