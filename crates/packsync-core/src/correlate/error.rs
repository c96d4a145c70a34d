//! Engine error types.

use crate::scheduler::{Slot, SlotOccupied};

use super::types::{ResourceLocator, SessionId};

/// Fatal errors that end a correlation run.
#[derive(Debug, thiserror::Error)]
pub enum CorrelateError {
    /// The trigger function rejected (navigation, click, probe failed).
    #[error("trigger failed for {item} in slot {slot}")]
    TriggerFailure {
        slot: Slot,
        item: String,
        #[source]
        source: anyhow::Error,
    },
    /// Work was placed into a slot that is already occupied.
    #[error("concurrency violation: {0}")]
    ConcurrencyViolation(#[from] SlotOccupied),
    /// A trigger resolved for a slot that has no pending trigger record.
    #[error("no pending trigger in slot {slot}")]
    NoPendingTrigger { slot: Slot },
    #[error("engine task join: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Non-fatal: a source event that matched nothing and was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unmatched {
    /// `started` whose locator matches no outstanding trigger record.
    Locator(ResourceLocator),
    /// `progress`/`completed`/`canceled` for a session that was never bound.
    Session(SessionId),
    /// `started` for a session id that is already bound.
    DuplicateSession(SessionId),
}
