//! Presence domain: stale heartbeat sweeping.
//!
//! Partner and rider apps keep `is_online`/`last_seen` fresh themselves. The
//! sweeper is the only server-side writer: it takes records whose heartbeat has
//! stalled offline so they stop being dispatch candidates.

pub mod effects;
pub mod models;

pub use effects::{run_presence_sweep, SweepReport};
pub use models::PresenceCollection;
