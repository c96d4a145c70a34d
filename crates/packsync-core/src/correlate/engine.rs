//! Async driver for a correlation run.
//!
//! One spawned task owns the [`RunState`], the in-flight trigger futures and
//! the event source receiver. Trigger completions and source events are
//! handled strictly one at a time; completed triggers are processed first when
//! both are ready so a `started` event never races its own locator.

use std::fmt;
use std::future::Future;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::scheduler::Slot;

use super::error::CorrelateError;
use super::state::{Dispatch, RunState, RunSummary};
use super::types::{DownloadEvent, ResourceLocator, SourceEvent};

/// Capacity of the correlated output channel.
const EVENT_BUFFER: usize = 64;

/// Handle to a running correlation: a finite stream of correlated events plus
/// the run's final result. Not restartable.
#[derive(Debug)]
pub struct Downloads<I> {
    events: mpsc::Receiver<DownloadEvent<I>>,
    run: JoinHandle<Result<RunSummary, CorrelateError>>,
}

impl<I> Downloads<I> {
    /// Next correlated event, or `None` once the run has ended.
    pub async fn next(&mut self) -> Option<DownloadEvent<I>> {
        self.events.recv().await
    }

    /// Wait for the run to end. Events not yet read are discarded.
    pub async fn finish(self) -> Result<RunSummary, CorrelateError> {
        drop(self.events);
        self.run.await?
    }
}

/// Start correlating downloads for `backlog`.
///
/// Up to `concurrency` items are triggered immediately. `trigger` maps an item
/// to the resource locator its download will be reported under; `source`
/// delivers the subsystem's lifecycle events. Dropping the source sender stops
/// the run early (`RunSummary::interrupted`).
///
/// Must be called from within a tokio runtime.
pub fn start<I, F, Fut>(
    concurrency: usize,
    backlog: Vec<I>,
    trigger: F,
    source: mpsc::Receiver<SourceEvent>,
) -> Downloads<I>
where
    I: Clone + fmt::Debug + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ResourceLocator>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let state = RunState::new(concurrency, backlog);
    let run = tokio::spawn(drive(state, trigger, source, tx));
    Downloads { events: rx, run }
}

type PendingTriggers = JoinSet<(Slot, Result<ResourceLocator>)>;

async fn drive<I, F, Fut>(
    mut state: RunState<I>,
    trigger: F,
    mut source: mpsc::Receiver<SourceEvent>,
    out: mpsc::Sender<DownloadEvent<I>>,
) -> Result<RunSummary, CorrelateError>
where
    I: Clone + fmt::Debug + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ResourceLocator>> + Send + 'static,
{
    tracing::debug!(
        total = state.total(),
        concurrency = state.concurrency(),
        "correlation run starting"
    );
    let mut pending = PendingTriggers::new();

    for dispatch in state.initial_dispatches() {
        spawn_trigger(&mut pending, &trigger, dispatch);
    }
    if let Some(done) = state.take_all_complete() {
        emit(&out, done).await;
        return Ok(state.summary(false));
    }

    loop {
        tokio::select! {
            biased;

            Some(joined) = pending.join_next(), if !pending.is_empty() => {
                let (slot, result) = match joined {
                    Ok(v) => v,
                    Err(e) => {
                        pending.detach_all();
                        return Err(e.into());
                    }
                };
                match result {
                    Ok(locator) => {
                        tracing::debug!(%slot, %locator, "trigger resolved");
                        let event = state.record_trigger(slot, locator)?;
                        emit(&out, event).await;
                    }
                    Err(err) => {
                        let item = state.abandon(slot);
                        tracing::warn!(%slot, ?item, "trigger failed: {:#}", err);
                        pending.detach_all();
                        return Err(CorrelateError::TriggerFailure {
                            slot,
                            item: format!("{:?}", item),
                            source: err,
                        });
                    }
                }
            }

            event = source.recv() => {
                let Some(event) = event else {
                    tracing::info!(
                        completed = state.completed(),
                        total = state.total(),
                        in_flight = state.in_flight(),
                        "event source closed before run finished"
                    );
                    pending.detach_all();
                    return Ok(state.summary(true));
                };

                let handled = state.handle(event)?;
                if let Some(unmatched) = handled.unmatched {
                    tracing::debug!(?unmatched, "dropping unmatched source event");
                }
                for event in handled.events {
                    emit(&out, event).await;
                }
                if let Some(dispatch) = handled.dispatch {
                    spawn_trigger(&mut pending, &trigger, dispatch);
                }
                if state.is_finished() {
                    tracing::debug!(
                        completed = state.completed(),
                        canceled = state.canceled(),
                        dropped = state.dropped(),
                        "correlation run finished"
                    );
                    return Ok(state.summary(false));
                }
            }
        }
    }
}

fn spawn_trigger<I, F, Fut>(pending: &mut PendingTriggers, trigger: &F, dispatch: Dispatch<I>)
where
    I: fmt::Debug,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<ResourceLocator>> + Send + 'static,
{
    let Dispatch { slot, item } = dispatch;
    tracing::debug!(%slot, ?item, "dispatching item");
    let fut = trigger(item);
    pending.spawn(async move { (slot, fut.await) });
}

async fn emit<I>(out: &mpsc::Sender<DownloadEvent<I>>, event: DownloadEvent<I>) {
    if out.send(event).await.is_err() {
        tracing::trace!("correlated event dropped: receiver gone");
    }
}

#[cfg(test)]
mod tests;
