//! Per-file progress of in-flight transfers.
//!
//! The table holds exactly the names of transfers currently running. The
//! whole table is published to the observer every time an entry is added,
//! updated or removed.

use serde::Serialize;

/// Progress of one in-flight transfer (CLI-friendly).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileProgress {
    pub name: String,
    /// Percent complete, 0..=100.
    pub progress: u8,
}

/// Ordered table of in-flight transfers, in admission order.
#[derive(Debug, Clone, Default)]
pub struct ProgressTable {
    entries: Vec<(u64, FileProgress)>,
}

impl ProgressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attempt at 0%.
    pub fn start(&mut self, attempt: u64, name: &str) {
        self.entries.push((
            attempt,
            FileProgress {
                name: name.to_string(),
                progress: 0,
            },
        ));
    }

    /// Record a report for an attempt. Returns false (and changes nothing) when
    /// the attempt is no longer in the table, e.g. a report that raced with
    /// settlement.
    pub fn update(&mut self, attempt: u64, percent: u8) -> bool {
        match self.entries.iter_mut().find(|(a, _)| *a == attempt) {
            Some((_, entry)) => {
                entry.progress = percent.min(100);
                true
            }
            None => false,
        }
    }

    /// Drop the entry of a settled attempt. Returns false if it was already gone.
    ///
    /// Entries are matched by attempt rather than by name so two in-flight
    /// files sharing a name never remove each other's row.
    pub fn remove(&mut self, attempt: u64) -> bool {
        match self.entries.iter().position(|(a, _)| *a == attempt) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the table for observers.
    pub fn snapshot(&self) -> Vec<FileProgress> {
        self.entries.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Mean percent over in-flight transfers (0 when idle).
    pub fn mean_percent(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.entries.iter().map(|(_, e)| e.progress as u64).sum();
        sum as f64 / self.entries.len() as f64
    }
}
