//! Slot lanes shared by the runner and the correlation engine.
//!
//! A slot is one concurrency lane in `[0, capacity)`. At most one item
//! occupies a slot at a time; a freed slot is handed out again before any
//! higher-numbered free slot.

use std::fmt;

/// Index of one concurrently-active execution lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(pub usize);

impl Slot {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returned when a caller tries to place work into a slot that is already
/// occupied, or into a slot outside the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("slot {slot} is occupied or out of range (capacity {capacity})")]
pub struct SlotOccupied {
    pub slot: Slot,
    pub capacity: usize,
}

/// Fixed-size pool of slots. Not thread-safe; owned by a single driver loop.
#[derive(Debug, Clone)]
pub struct SlotPool {
    occupied: Vec<bool>,
}

impl SlotPool {
    /// Create a pool with `capacity` lanes (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            occupied: vec![false; capacity.max(1)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.occupied.len()
    }

    /// Number of occupied slots.
    pub fn in_use(&self) -> usize {
        self.occupied.iter().filter(|o| **o).count()
    }

    pub fn is_full(&self) -> bool {
        self.occupied.iter().all(|o| *o)
    }

    pub fn is_occupied(&self, slot: Slot) -> bool {
        self.occupied.get(slot.0).copied().unwrap_or(false)
    }

    /// Occupy and return the lowest free slot, or `None` when every lane is busy.
    pub fn acquire(&mut self) -> Option<Slot> {
        let index = self.occupied.iter().position(|o| !*o)?;
        self.occupied[index] = true;
        Some(Slot(index))
    }

    /// Occupy a specific slot. Fails if it is already held or out of range.
    pub fn occupy(&mut self, slot: Slot) -> Result<(), SlotOccupied> {
        match self.occupied.get_mut(slot.0) {
            Some(o) if !*o => {
                *o = true;
                Ok(())
            }
            _ => Err(SlotOccupied {
                slot,
                capacity: self.capacity(),
            }),
        }
    }

    /// Free a slot. Releasing a free slot is a no-op.
    pub fn release(&mut self, slot: Slot) {
        if let Some(o) = self.occupied.get_mut(slot.0) {
            *o = false;
        }
    }
}
