//! Load lifecycle of the provider's data set.
//!
//! [`LoadStateMachine`] is the single owner of the "is data servable"
//! state; [`RefreshDriver`] starts refreshes on its behalf, on request, on
//! a timer, or when a request finds nothing loaded.

mod driver;
mod machine;

pub use driver::{RefreshDriver, ReloadOutcome};
pub use machine::{LoadPhase, LoadStateMachine, LoadStatus, RefreshGuard};
