//! Bounded concurrency runner.
//!
//! Launches two-phase tasks into a fixed number of slots: the primary phase
//! initiates work, the optional secondary finishes it. The next queued task is
//! launched as soon as a slot frees, and the run only ends once every
//! secondary has completed too.

mod parallel;
mod slots;
mod task;

pub use parallel::{run_two_phase, RunReport, SlotRelease};
pub use slots::{Slot, SlotOccupied, SlotPool};
pub use task::{task, Initiated, PrimaryFuture, Secondary, Task};
