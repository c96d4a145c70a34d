//! Run state for one correlation run.
//!
//! Owns every correlation structure (backlog, trigger records, session
//! bindings, slot lanes, counters). All transitions happen through `&mut self`
//! from a single driver loop, so no locking is needed.

use std::collections::{HashMap, VecDeque};

use crate::scheduler::{Slot, SlotPool};

use super::error::{CorrelateError, Unmatched};
use super::types::{percentage, DownloadEvent, ResourceLocator, SessionId, SourceEvent};

/// Item dispatched into a slot; the driver must call the trigger function for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch<I> {
    pub slot: Slot,
    pub item: I,
}

/// Links a dispatched item to the locator its trigger produced.
#[derive(Debug)]
struct TriggerRecord<I> {
    slot: Slot,
    item: I,
    /// `None` until the trigger resolves.
    locator: Option<ResourceLocator>,
    /// True once a `started` event has been matched to this record.
    bound: bool,
}

#[derive(Debug, Clone)]
struct SessionBinding {
    slot: Slot,
}

/// Outcome of handling one source event.
#[derive(Debug)]
pub struct Handled<I> {
    /// Correlated events to emit, in order.
    pub events: Vec<DownloadEvent<I>>,
    /// Next item placed into the freed slot, if backlog remained.
    pub dispatch: Option<Dispatch<I>>,
    /// Set when the event matched nothing and was dropped.
    pub unmatched: Option<Unmatched>,
}

impl<I> Handled<I> {
    fn dropped(reason: Unmatched) -> Self {
        Self {
            events: Vec::new(),
            dispatch: None,
            unmatched: Some(reason),
        }
    }

    fn emit(event: DownloadEvent<I>) -> Self {
        Self {
            events: vec![event],
            dispatch: None,
            unmatched: None,
        }
    }
}

/// Counters reported when a run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Backlog length.
    pub total: usize,
    pub completed: usize,
    pub canceled: usize,
    /// Source events dropped because they matched nothing.
    pub dropped: usize,
    /// True when the event source closed before every item settled.
    pub interrupted: bool,
}

#[derive(Debug)]
pub struct RunState<I> {
    backlog: VecDeque<I>,
    total: usize,
    dispatched: usize,
    completed: usize,
    canceled: usize,
    dropped: usize,
    slots: SlotPool,
    /// Live trigger records in dispatch order (oldest first).
    triggers: Vec<TriggerRecord<I>>,
    bindings: HashMap<SessionId, SessionBinding>,
    finished: bool,
}

impl<I: Clone> RunState<I> {
    pub fn new(concurrency: usize, backlog: impl IntoIterator<Item = I>) -> Self {
        let backlog: VecDeque<I> = backlog.into_iter().collect();
        Self {
            total: backlog.len(),
            backlog,
            dispatched: 0,
            completed: 0,
            canceled: 0,
            dropped: 0,
            slots: SlotPool::new(concurrency),
            triggers: Vec::new(),
            bindings: HashMap::new(),
            finished: false,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn canceled(&self) -> usize {
        self.canceled
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Number of live trigger records (items occupying a slot).
    pub fn in_flight(&self) -> usize {
        self.triggers.len()
    }

    pub fn queued(&self) -> usize {
        self.backlog.len()
    }

    pub fn concurrency(&self) -> usize {
        self.slots.capacity()
    }

    /// True once the terminal event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn settled(&self) -> usize {
        self.completed + self.canceled
    }

    pub fn summary(&self, interrupted: bool) -> RunSummary {
        RunSummary {
            total: self.total,
            completed: self.completed,
            canceled: self.canceled,
            dropped: self.dropped,
            interrupted,
        }
    }

    /// Dispatch the next queued item into the lowest free slot.
    pub fn next_dispatch(&mut self) -> Option<Dispatch<I>> {
        if self.backlog.is_empty() {
            return None;
        }
        let slot = self.slots.acquire()?;
        self.place(slot)
    }

    /// Fill every free slot from the backlog. Used once at start.
    pub fn initial_dispatches(&mut self) -> Vec<Dispatch<I>> {
        let mut out = Vec::new();
        while let Some(d) = self.next_dispatch() {
            out.push(d);
        }
        out
    }

    /// Dispatch the next queued item into `slot`, which must be free.
    pub(crate) fn dispatch_into(
        &mut self,
        slot: Slot,
    ) -> Result<Option<Dispatch<I>>, CorrelateError> {
        if self.backlog.is_empty() {
            return Ok(None);
        }
        self.slots.occupy(slot)?;
        Ok(self.place(slot))
    }

    /// Pop the next item into an already-occupied `slot`.
    fn place(&mut self, slot: Slot) -> Option<Dispatch<I>> {
        let Some(item) = self.backlog.pop_front() else {
            self.slots.release(slot);
            return None;
        };
        self.dispatched += 1;
        self.triggers.push(TriggerRecord {
            slot,
            item: item.clone(),
            locator: None,
            bound: false,
        });
        Some(Dispatch { slot, item })
    }

    /// Record the locator returned by the trigger for `slot`.
    pub fn record_trigger(
        &mut self,
        slot: Slot,
        locator: ResourceLocator,
    ) -> Result<DownloadEvent<I>, CorrelateError> {
        let record = self
            .triggers
            .iter_mut()
            .find(|r| r.slot == slot && r.locator.is_none())
            .ok_or(CorrelateError::NoPendingTrigger { slot })?;
        record.locator = Some(locator.clone());
        Ok(DownloadEvent::Triggered {
            slot,
            item: record.item.clone(),
            locator,
        })
    }

    /// Drop the record for a slot whose trigger failed and free the slot.
    pub fn abandon(&mut self, slot: Slot) -> Option<I> {
        let index = self.triggers.iter().position(|r| r.slot == slot)?;
        let record = self.triggers.remove(index);
        self.bindings.retain(|_, b| b.slot != slot);
        self.slots.release(slot);
        Some(record.item)
    }

    /// Produce the terminal event if every item has settled and it was not produced yet.
    pub fn take_all_complete(&mut self) -> Option<DownloadEvent<I>> {
        if self.finished || self.settled() < self.total {
            return None;
        }
        self.finished = true;
        Some(DownloadEvent::AllComplete)
    }

    /// Apply one source event.
    pub fn handle(&mut self, event: SourceEvent) -> Result<Handled<I>, CorrelateError> {
        let handled = match event {
            SourceEvent::Started {
                session_id,
                locator,
            } => self.on_started(session_id, locator),
            SourceEvent::Progress {
                session_id,
                received,
                total,
            } => self.on_progress(session_id, received, total),
            SourceEvent::Completed { session_id } => self.on_settled(session_id, false)?,
            SourceEvent::Canceled { session_id } => self.on_settled(session_id, true)?,
        };
        if handled.unmatched.is_some() {
            self.dropped += 1;
        }
        Ok(handled)
    }

    fn on_started(&mut self, session_id: SessionId, locator: ResourceLocator) -> Handled<I> {
        if self.bindings.contains_key(&session_id) {
            return Handled::dropped(Unmatched::DuplicateSession(session_id));
        }
        let Some(record) = self
            .triggers
            .iter_mut()
            .find(|r| !r.bound && r.locator.as_ref() == Some(&locator))
        else {
            return Handled::dropped(Unmatched::Locator(locator));
        };
        record.bound = true;
        let slot = record.slot;
        let item = record.item.clone();
        self.bindings.insert(session_id, SessionBinding { slot });
        Handled::emit(DownloadEvent::Started {
            slot,
            item,
            locator,
        })
    }

    fn on_progress(&mut self, session_id: SessionId, received: u64, total: u64) -> Handled<I> {
        let record = self
            .bindings
            .get(&session_id)
            .and_then(|b| self.triggers.iter().find(|r| r.slot == b.slot && r.bound));
        match record {
            Some(r) => Handled::emit(DownloadEvent::InProgress {
                slot: r.slot,
                item: r.item.clone(),
                percentage: percentage(received, total),
            }),
            None => Handled::dropped(Unmatched::Session(session_id)),
        }
    }

    fn on_settled(
        &mut self,
        session_id: SessionId,
        canceled: bool,
    ) -> Result<Handled<I>, CorrelateError> {
        let Some(binding) = self.bindings.remove(&session_id) else {
            return Ok(Handled::dropped(Unmatched::Session(session_id)));
        };
        let Some(index) = self
            .triggers
            .iter()
            .position(|r| r.slot == binding.slot && r.bound)
        else {
            return Ok(Handled::dropped(Unmatched::Session(session_id)));
        };
        let record = self.triggers.remove(index);
        let slot = record.slot;
        // Bound records always carry a locator.
        let locator = record.locator.unwrap_or_else(|| ResourceLocator(String::new()));
        self.slots.release(slot);

        let mut events = Vec::with_capacity(2);
        if canceled {
            self.canceled += 1;
            events.push(DownloadEvent::Canceled {
                slot,
                item: record.item,
                locator,
            });
        } else {
            self.completed += 1;
            events.push(DownloadEvent::Completed {
                slot,
                item: record.item,
                locator,
            });
        }

        let dispatch = self.dispatch_into(slot)?;
        if dispatch.is_none() {
            events.extend(self.take_all_complete());
        }
        Ok(Handled {
            events,
            dispatch,
            unmatched: None,
        })
    }
}
