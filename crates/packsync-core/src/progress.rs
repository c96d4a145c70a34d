//! Text progress board for a correlation run: a "Downloaded X of Y" header
//! followed by one line per slot.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::correlate::{DownloadEvent, Slot};

#[derive(Debug, Clone, PartialEq)]
enum SlotStatus {
    Pending,
    Starting,
    InProgress(f64),
    Complete,
    Canceled,
}

#[derive(Debug, Clone)]
struct SlotLine {
    status: SlotStatus,
    label: String,
}

#[derive(Debug, Clone)]
pub struct ProgressBoard {
    total: usize,
    downloaded: usize,
    canceled: usize,
    slots: BTreeMap<Slot, SlotLine>,
}

impl ProgressBoard {
    pub fn new(total: usize, concurrency: usize) -> Self {
        let slots = (0..concurrency.max(1).min(total.max(1)))
            .map(|i| {
                (
                    Slot(i),
                    SlotLine {
                        status: SlotStatus::Pending,
                        label: String::new(),
                    },
                )
            })
            .collect();
        Self {
            total,
            downloaded: 0,
            canceled: 0,
            slots,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded
    }

    pub fn canceled(&self) -> usize {
        self.canceled
    }

    /// Fold `event` into the board. `label` names an item for its slot line.
    pub fn apply<I>(&mut self, event: &DownloadEvent<I>, label: impl Fn(&I) -> String) {
        let (slot, item, status) = match event {
            DownloadEvent::Triggered { slot, item, .. }
            | DownloadEvent::Started { slot, item, .. } => (*slot, item, SlotStatus::Starting),
            DownloadEvent::InProgress {
                slot,
                item,
                percentage,
            } => (*slot, item, SlotStatus::InProgress(*percentage)),
            DownloadEvent::Completed { slot, item, .. } => {
                self.downloaded += 1;
                (*slot, item, SlotStatus::Complete)
            }
            DownloadEvent::Canceled { slot, item, .. } => {
                self.canceled += 1;
                (*slot, item, SlotStatus::Canceled)
            }
            DownloadEvent::AllComplete => return,
        };
        self.slots.insert(
            slot,
            SlotLine {
                status,
                label: label(item),
            },
        );
    }

    pub fn render(&self) -> String {
        let width = self
            .slots
            .keys()
            .next_back()
            .map(|s| (s.0 + 1).to_string().len())
            .unwrap_or(1);
        let mut out = format!("Downloaded {} of {}", self.downloaded, self.total);
        if self.canceled > 0 {
            let _ = write!(out, " ({} canceled)", self.canceled);
        }
        for (slot, line) in &self.slots {
            let status = match line.status {
                SlotStatus::Pending => "Pending".to_string(),
                SlotStatus::Starting => "Starting".to_string(),
                SlotStatus::InProgress(p) => format!("{:>6.2}%", p),
                SlotStatus::Complete => "100% Complete".to_string(),
                SlotStatus::Canceled => "Canceled".to_string(),
            };
            let _ = write!(out, "\n{:<width$} {}", slot.0 + 1, status, width = width);
            if !line.label.is_empty() {
                let _ = write!(out, " {}", line.label);
            }
        }
        out
    }
}
