//! # History
//!
//! Undo/redo over whole snapshots of page data plus the selection.
//!
//! ## Design
//!
//! - Every entry is a full snapshot; data is shared copy-on-write, so
//!   unchanged subtrees cost nothing
//! - A new entry clears the future
//! - Repeated edits to the same fields of the same target within the
//!   debounce window coalesce into one entry (typing into a field is one
//!   undo step)
//! - Resolver commits amend the present entry instead of adding one
//! - The past is capped; the oldest entries are dropped first
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = History::new(HistoryEntry::capture(&state));
//!
//! history.record(HistoryEntry::capture(&next), Some(key), clock.now());
//!
//! if let Some(entry) = history.back() {
//!     // restore entry.data and apply entry.ui
//! }
//! ```

use crate::state::{AppState, UiPatch};
use puck_common::Data;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Monotonic time source for debouncing
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub data: Arc<Data>,
    /// UI restored with the entry; only the selection is captured
    pub ui: UiPatch,
}

impl HistoryEntry {
    pub fn capture(state: &AppState) -> Self {
        Self {
            data: Arc::clone(&state.data),
            ui: UiPatch::select(state.ui.item_selector.clone()),
        }
    }
}

/// Identifies a burst of edits that may coalesce
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditKey {
    pub target: String,
    pub fields: Vec<String>,
}

impl EditKey {
    pub fn new(target: impl Into<String>, fields: Vec<String>) -> Self {
        let mut fields = fields;
        fields.sort();
        Self {
            target: target.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Pushed,
    Coalesced,
}

#[derive(Debug, Clone)]
struct PendingEdit {
    key: EditKey,
    at: Duration,
}

#[derive(Debug)]
pub struct History {
    past: Vec<HistoryEntry>,
    present: HistoryEntry,
    /// Undone entries, most recent last
    future: Vec<HistoryEntry>,
    window: Duration,
    /// Maximum number of past entries (0 = unlimited)
    max_entries: usize,
    pending: Option<PendingEdit>,
}

impl History {
    pub fn new(initial: HistoryEntry) -> Self {
        Self::with_options(initial, DEFAULT_WINDOW, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_options(initial: HistoryEntry, window: Duration, max_entries: usize) -> Self {
        Self {
            past: Vec::new(),
            present: initial,
            future: Vec::new(),
            window,
            max_entries,
            pending: None,
        }
    }

    /// Record a new entry unconditionally
    pub fn push(&mut self, entry: HistoryEntry) {
        self.pending = None;
        self.push_entry(entry);
    }

    /// Record a new entry, coalescing it into the present one when it
    /// continues the pending edit within the window
    pub fn record(&mut self, entry: HistoryEntry, key: Option<EditKey>, now: Duration) -> Recorded {
        let continues = match (&key, &self.pending) {
            (Some(key), Some(pending)) => {
                pending.key == *key && now.saturating_sub(pending.at) <= self.window
            }
            _ => false,
        };

        if continues {
            trace!("Coalescing history entry");
            self.present = entry;
            self.future.clear();
        } else {
            self.push_entry(entry);
        }

        self.pending = key.map(|key| PendingEdit { key, at: now });
        if continues {
            Recorded::Coalesced
        } else {
            Recorded::Pushed
        }
    }

    /// Replace the present entry without creating an undo step
    pub fn amend(&mut self, entry: HistoryEntry) {
        self.present = entry;
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        let previous = std::mem::replace(&mut self.present, entry);
        self.past.push(previous);

        // Trim if exceeded max entries
        if self.max_entries > 0 && self.past.len() > self.max_entries {
            self.past.remove(0);
        }

        self.future.clear();
        trace!(past = self.past.len(), "History entry pushed");
    }

    /// Step back; returns the entry to restore
    pub fn back(&mut self) -> Option<&HistoryEntry> {
        let previous = self.past.pop()?;
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push(current);
        self.pending = None;
        Some(&self.present)
    }

    /// Step forward; returns the entry to restore
    pub fn forward(&mut self) -> Option<&HistoryEntry> {
        let next = self.future.pop()?;
        let current = std::mem::replace(&mut self.present, next);
        self.past.push(current);
        self.pending = None;
        Some(&self.present)
    }

    pub fn has_past(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn has_future(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn present(&self) -> &HistoryEntry {
        &self.present
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    /// Forget everything and start over from `entry`
    pub fn reset(&mut self, entry: HistoryEntry) {
        self.past.clear();
        self.future.clear();
        self.present = entry;
        self.pending = None;
    }
}
