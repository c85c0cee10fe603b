// Roadside Dispatch - Dispatch Core
//
// Event-driven dispatch for rides, roadside assistance and emergency cases:
// given a new or updated request, find the nearest eligible partner, notify
// them, and keep re-dispatching on rejection until someone accepts or the
// request runs out of options.
//
// Architecture: domains (dispatch, presence) own their models and logic; the
// kernel holds infrastructure traits and their implementations.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
