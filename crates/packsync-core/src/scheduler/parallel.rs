//! Run two-phase tasks with a bounded number of slots.
//!
//! Keeps up to `concurrency` tasks in flight at once; when one frees its
//! slot, the next queued task is launched into it until the queue is empty.
//! Secondary operations are collected and awaited before returning.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use super::slots::{Slot, SlotPool};
use super::task::{Secondary, Task};

/// Which phase of a task holds its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotRelease {
    /// The slot frees as soon as the primary phase resolves.
    #[default]
    Primary,
    /// The slot frees only once the task's secondary has also finished.
    Secondary,
}

/// Counters from a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Tasks launched (equals the number of tasks on success).
    pub launched: usize,
    /// Secondary operations awaited.
    pub secondaries: usize,
}

enum Lane {
    /// Primary resolved; the secondary (if any) runs outside the slot.
    Initiated(Option<Secondary>),
    /// Primary and secondary both ran while holding the slot.
    Settled { had_secondary: bool, result: Result<()> },
}

/// Runs `tasks` in order with at most `concurrency` of them holding a slot.
///
/// A failing primary phase returns immediately; tasks still running are
/// detached, not cancelled. A failing secondary is reported after every other
/// secondary has finished (first failure wins).
pub async fn run_two_phase(
    concurrency: usize,
    tasks: Vec<Task>,
    release: SlotRelease,
) -> Result<RunReport> {
    let mut slots = SlotPool::new(concurrency);
    let mut queue = tasks.into_iter().peekable();
    let mut lanes: JoinSet<(Slot, Result<Lane>)> = JoinSet::new();
    let mut secondaries: JoinSet<Result<()>> = JoinSet::new();
    let mut report = RunReport::default();
    let mut secondary_err: Option<anyhow::Error> = None;

    tracing::debug!(concurrency = slots.capacity(), ?release, "two-phase run starting");

    loop {
        while queue.peek().is_some() {
            let Some(slot) = slots.acquire() else {
                break;
            };
            let Some(task) = queue.next() else {
                slots.release(slot);
                break;
            };
            report.launched += 1;
            tracing::debug!(%slot, launched = report.launched, "launching task");
            lanes.spawn(run_lane(slot, task, release));
        }

        let Some(joined) = lanes.join_next().await else {
            break;
        };
        let (slot, lane) = match joined {
            Ok(v) => v,
            Err(e) => {
                lanes.detach_all();
                secondaries.detach_all();
                return Err(anyhow::anyhow!("task join: {}", e));
            }
        };
        slots.release(slot);

        match lane {
            Err(e) => {
                lanes.detach_all();
                secondaries.detach_all();
                tracing::warn!(%slot, "task failed during its primary phase: {:#}", e);
                return Err(e.context(format!("task in slot {} failed to initiate", slot)));
            }
            Ok(Lane::Initiated(Some(secondary))) => {
                report.secondaries += 1;
                secondaries.spawn(secondary);
            }
            Ok(Lane::Initiated(None)) => {}
            Ok(Lane::Settled {
                had_secondary,
                result,
            }) => {
                if had_secondary {
                    report.secondaries += 1;
                }
                if let Err(e) = result {
                    tracing::warn!(%slot, "secondary phase failed: {:#}", e);
                    secondary_err.get_or_insert(e);
                }
            }
        }
    }

    while let Some(joined) = secondaries.join_next().await {
        let result = joined
            .map_err(|e| anyhow::anyhow!("secondary join: {}", e))
            .and_then(|r| r);
        if let Err(e) = result {
            tracing::warn!("secondary phase failed: {:#}", e);
            secondary_err.get_or_insert(e);
        }
    }

    match secondary_err {
        Some(e) => Err(e),
        None => {
            tracing::debug!(
                launched = report.launched,
                secondaries = report.secondaries,
                "two-phase run finished"
            );
            Ok(report)
        }
    }
}

async fn run_lane(slot: Slot, task: Task, release: SlotRelease) -> (Slot, Result<Lane>) {
    let initiated = match task(slot).await {
        Ok(i) => i,
        Err(e) => return (slot, Err(e)),
    };
    let lane = match release {
        SlotRelease::Primary => Lane::Initiated(initiated.into_secondary()),
        SlotRelease::Secondary => match initiated.into_secondary() {
            Some(secondary) => Lane::Settled {
                had_secondary: true,
                result: secondary.await,
            },
            None => Lane::Settled {
                had_secondary: false,
                result: Ok(()),
            },
        },
    };
    (slot, Ok(lane))
}
