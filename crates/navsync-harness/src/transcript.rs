#![forbid(unsafe_code)]

//! Ordered record of what a mounted view observed, exportable as JSONL.
//!
//! Attach a [`Transcript`] to a tracker and an unread-count stream; it logs
//! location changes, count changes, and lifecycle transitions as they
//! happen. Feed errors from the stream are recorded explicitly with
//! [`Transcript::record_item`]. Each JSONL line carries a `seq` number and a
//! `kind` tag.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use navsync_core::{SyncError, UnreadCount};
use navsync_runtime::{LifecycleState, Subscription, TrackerHandle, UnreadCounts};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Location { path: String },
    Count { count: usize },
    State { state: LifecycleState },
    Error { message: String },
    Note { text: String },
}

impl Entry {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Location { .. } => "location",
            Self::Count { .. } => "count",
            Self::State { .. } => "state",
            Self::Error { .. } => "error",
            Self::Note { .. } => "note",
        }
    }

    fn to_json(&self, seq: usize) -> serde_json::Value {
        match self {
            Self::Location { path } => json!({ "seq": seq, "kind": self.kind(), "path": path }),
            Self::Count { count } => json!({ "seq": seq, "kind": self.kind(), "count": count }),
            Self::State { state } => {
                json!({ "seq": seq, "kind": self.kind(), "state": state.as_str() })
            }
            Self::Error { message } => {
                json!({ "seq": seq, "kind": self.kind(), "message": message })
            }
            Self::Note { text } => json!({ "seq": seq, "kind": self.kind(), "text": text }),
        }
    }
}

#[derive(Default)]
pub struct Transcript {
    entries: Rc<RefCell<Vec<Entry>>>,
    guards: Vec<Subscription>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every location change of `tracker`.
    pub fn attach_tracker(&mut self, tracker: &TrackerHandle) {
        let entries = Rc::clone(&self.entries);
        self.guards.push(tracker.on_location_change(move |location| {
            entries.borrow_mut().push(Entry::Location {
                path: location.path().to_string(),
            });
        }));
    }

    /// Record count changes and lifecycle transitions of `counts`.
    pub fn attach_counts(&mut self, counts: &UnreadCounts) {
        let entries = Rc::clone(&self.entries);
        self.guards.push(counts.on_count_change(move |count| {
            entries
                .borrow_mut()
                .push(Entry::Count { count: count.get() });
        }));
        let entries = Rc::clone(&self.entries);
        self.guards.push(counts.on_state_change(move |state| {
            entries.borrow_mut().push(Entry::State { state });
        }));
    }

    /// Record a stream item. Only errors are logged here; counts already
    /// arrive through the count listener.
    pub fn record_item(&self, item: &Result<UnreadCount, SyncError>) {
        if let Err(err) = item {
            self.record(Entry::Error {
                message: err.to_string(),
            });
        }
    }

    pub fn note(&self, text: impl Into<String>) {
        self.record(Entry::Note { text: text.into() });
    }

    pub fn record(&self, entry: Entry) {
        self.entries.borrow_mut().push(entry);
    }

    /// Stop recording; existing entries are kept.
    pub fn detach(&mut self) {
        self.guards.clear();
    }

    #[must_use]
    pub fn entries(&self) -> Vec<Entry> {
        self.entries.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One JSON object per line.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        let mut out = String::new();
        for (seq, entry) in self.entries.borrow().iter().enumerate() {
            out.push_str(&entry.to_json(seq).to_string());
            out.push('\n');
        }
        out
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript")
            .field("entries", &self.len())
            .field("attached", &self.guards.len())
            .finish()
    }
}
