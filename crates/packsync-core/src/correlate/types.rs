//! Identifiers and event types flowing into and out of the correlation engine.

use std::fmt;

use crate::scheduler::Slot;

/// Opaque identifier the download subsystem assigns once a download begins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

/// Name of the thing being downloaded (e.g. its URL), known right after triggering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocator(pub String);

macro_rules! string_newtype {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_newtype!(SessionId);
string_newtype!(ResourceLocator);

/// Lifecycle event reported by the external download subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A download began; `locator` names what is being fetched.
    Started {
        session_id: SessionId,
        locator: ResourceLocator,
    },
    Progress {
        session_id: SessionId,
        received: u64,
        total: u64,
    },
    Completed {
        session_id: SessionId,
    },
    /// The subsystem gave up on the download (platform "canceled" state).
    Canceled {
        session_id: SessionId,
    },
}

impl SourceEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            SourceEvent::Started { session_id, .. }
            | SourceEvent::Progress { session_id, .. }
            | SourceEvent::Completed { session_id }
            | SourceEvent::Canceled { session_id } => session_id,
        }
    }
}

/// Correlated event emitted to the caller, labeled with slot and item.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent<I> {
    /// The trigger resolved and its locator is recorded against the slot.
    Triggered {
        slot: Slot,
        item: I,
        locator: ResourceLocator,
    },
    Started {
        slot: Slot,
        item: I,
        locator: ResourceLocator,
    },
    /// `percentage` is in `[0, 100]`.
    InProgress {
        slot: Slot,
        item: I,
        percentage: f64,
    },
    Completed {
        slot: Slot,
        item: I,
        locator: ResourceLocator,
    },
    Canceled {
        slot: Slot,
        item: I,
        locator: ResourceLocator,
    },
    /// Terminal: every backlog item has settled. Emitted once.
    AllComplete,
}

impl<I> DownloadEvent<I> {
    /// Slot the event belongs to (`None` for the terminal event).
    pub fn slot(&self) -> Option<Slot> {
        match self {
            DownloadEvent::Triggered { slot, .. }
            | DownloadEvent::Started { slot, .. }
            | DownloadEvent::InProgress { slot, .. }
            | DownloadEvent::Completed { slot, .. }
            | DownloadEvent::Canceled { slot, .. } => Some(*slot),
            DownloadEvent::AllComplete => None,
        }
    }

    pub fn item(&self) -> Option<&I> {
        match self {
            DownloadEvent::Triggered { item, .. }
            | DownloadEvent::Started { item, .. }
            | DownloadEvent::InProgress { item, .. }
            | DownloadEvent::Completed { item, .. }
            | DownloadEvent::Canceled { item, .. } => Some(item),
            DownloadEvent::AllComplete => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadEvent::AllComplete)
    }
}

/// Percentage of `received` over `total`, in `[0, 100]`. Unknown totals report 0.
pub fn percentage(received: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (100.0 * received as f64 / total as f64).min(100.0)
}
