//! Two-phase task type: a primary phase that initiates work and an optional
//! secondary operation that finishes it.

use anyhow::Result;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use super::slots::Slot;

/// Boxed future for the long-running part of a task (e.g. a body transfer).
pub type Secondary = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Boxed future returned by a task's primary phase.
pub type PrimaryFuture = Pin<Box<dyn Future<Output = Result<Initiated>> + Send + 'static>>;

/// A task launched by the runner. Receives the slot it was launched into.
pub type Task = Box<dyn FnOnce(Slot) -> PrimaryFuture + Send + 'static>;

/// Result of a task's primary phase.
///
/// Carries the secondary operation, if any, that must still complete before
/// the run is considered finished.
pub struct Initiated {
    secondary: Option<Secondary>,
}

impl Initiated {
    /// Primary phase did all the work; nothing left to wait for.
    pub fn done() -> Self {
        Self { secondary: None }
    }

    /// Primary phase started `secondary`, which the runner awaits separately.
    pub fn with_secondary<F>(secondary: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            secondary: Some(Box::pin(secondary)),
        }
    }

    pub fn into_secondary(self) -> Option<Secondary> {
        self.secondary
    }
}

impl fmt::Debug for Initiated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Initiated")
            .field("secondary", &self.secondary.is_some())
            .finish()
    }
}

/// Box a closure into a [`Task`].
pub fn task<F, Fut>(f: F) -> Task
where
    F: FnOnce(Slot) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Initiated>> + Send + 'static,
{
    Box::new(move |slot| Box::pin(f(slot)))
}
