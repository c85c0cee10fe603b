//! Dispatch domain: finding and notifying a partner for a waiting request.
//!
//! Change events (`DispatchTrigger`) go through `RequestLifecycleMachine`, which
//! emits commands; `DispatchEngine` executes them with the per-kind
//! `DispatchProfile` driving a single shared strategy.

pub mod commands;
pub mod effects;
pub mod errors;
pub mod events;
pub mod machines;
pub mod models;
pub mod policy;
pub mod profiles;
pub mod utils;

// Re-export commonly used types
pub use commands::DispatchCommand;
pub use effects::{DispatchEngine, StrategyRun};
pub use errors::DispatchError;
pub use events::{DispatchOutcome, DispatchTrigger};
pub use machines::RequestLifecycleMachine;
pub use policy::DispatchPolicy;
pub use profiles::{DispatchProfile, TokenlessPolicy};
