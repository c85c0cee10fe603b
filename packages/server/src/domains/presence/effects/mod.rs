pub mod sweeper;

pub use sweeper::{run_presence_sweep, SweepReport, DEFAULT_STALE_AFTER_SECS};
