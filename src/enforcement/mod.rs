//! Enforcement system for flair-warden
//!
//! One independent enforcement run is started per incoming submission. A run
//! walks a fixed sequence of policy checks, may suspend until computed
//! deadlines, re-fetches state after suspending, and issues at most one
//! terminal moderation action.

mod dedup;
mod dispatcher;
mod engine;
mod error;

pub use dedup::DedupIndex;
pub use dispatcher::FeedDispatcher;
pub use engine::{EnforcementEngine, RunOutcome};
pub use error::{EnforcementError, EnforcementResult};
