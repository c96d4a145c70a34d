//! Download correlation engine.
//!
//! Triggering a download yields a resource locator quickly, but the download's
//! lifecycle (started / progress / completed) arrives later on a separate
//! event channel keyed by a session id the engine cannot predict. The engine
//! binds each session to the item that triggered it, re-emits lifecycle events
//! labeled with slot and item, and dispatches the next queued item into the
//! slot a completed download frees.
//!
//! Per item: queued → triggered → started → in progress → completed.

mod engine;
mod error;
mod state;
mod types;

pub use engine::{start, Downloads};
pub use error::{CorrelateError, Unmatched};
pub use state::{Dispatch, Handled, RunState, RunSummary};
pub use types::{percentage, DownloadEvent, ResourceLocator, SessionId, SourceEvent};

pub use crate::scheduler::Slot;
