//! Command pipeline
//!
//! utterance -> NlCommandRouter -> Command -> (ConfirmationGate) ->
//! CommandDispatcher -> DisplayResult, with ResponseCache in front of reads.

pub mod cache;
pub mod confirmation;
pub mod dispatcher;
pub mod format;
pub mod router;

pub use cache::{CacheStats, ResponseCache};
pub use confirmation::{ConfirmationGate, ConfirmedAction, Hold, PendingAction, Reply, Resolution};
pub use dispatcher::{CommandDispatcher, PendingTarget};
pub use format::{DisplayKind, DisplayResult};
pub use router::{NlCommandRouter, RouteOutcome};
