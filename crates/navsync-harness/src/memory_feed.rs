#![forbid(unsafe_code)]

//! In-memory feed backend.
//!
//! [`MemoryFeed`] stores notification items (owner + read state) and serves
//! live queries over them. Every mutation recomputes each live query's result
//! size and reports the ones that changed. Opens can be held back to model a
//! slow backend, or made to fail once.
//!
//! # Invariants
//!
//! 1. A query is registered only when its open resolves successfully, and is
//!    removed when cancelled. `live_query_count()` is exactly the number of
//!    outstanding, uncancelled queries.
//! 2. Sinks are called after the store borrow is released.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use navsync_core::{FeedError, FeedFilter, Identity, ReadState};
use navsync_runtime::{ChangeSink, FeedBackend, FeedQuery};

struct Item {
    id: u64,
    owner: String,
    state: ReadState,
}

struct LiveEntry {
    id: u64,
    filter: FeedFilter,
    sink: ChangeSink,
    last_len: usize,
}

#[derive(Default)]
struct Store {
    items: Vec<Item>,
    next_item: u64,
    queries: Vec<LiveEntry>,
    next_query: u64,
    hold: bool,
    held: Vec<oneshot::Sender<()>>,
    failures: VecDeque<FeedError>,
    opened_total: u64,
    cancelled_total: u64,
}

impl Store {
    fn len_for(&self, filter: &FeedFilter) -> usize {
        self.items
            .iter()
            .filter(|item| item.owner == filter.owner.as_str() && item.state == filter.state)
            .count()
    }

    fn changed_sinks(&mut self) -> Vec<(ChangeSink, usize)> {
        let lens: Vec<usize> = self.queries.iter().map(|q| self.len_for(&q.filter)).collect();
        let mut changed = Vec::new();
        for (query, len) in self.queries.iter_mut().zip(lens) {
            if query.last_len != len {
                query.last_len = len;
                changed.push((Rc::clone(&query.sink), len));
            }
        }
        changed
    }
}

/// Shared handle to an in-memory feed. Clones see the same store.
#[derive(Clone, Default)]
pub struct MemoryFeed {
    store: Rc<RefCell<Store>>,
}

impl MemoryFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item and return its id.
    pub fn insert(&self, owner: &str, state: ReadState) -> u64 {
        let id = {
            let mut store = self.store.borrow_mut();
            let id = store.next_item;
            store.next_item += 1;
            store.items.push(Item {
                id,
                owner: owner.to_string(),
                state,
            });
            id
        };
        self.notify();
        id
    }

    pub fn insert_unread(&self, owner: &str) -> u64 {
        self.insert(owner, ReadState::Unread)
    }

    /// Add `n` unread items for `owner`.
    pub fn seed_unread(&self, owner: &str, n: usize) {
        for _ in 0..n {
            self.insert_unread(owner);
        }
    }

    /// Returns false if no item has that id.
    pub fn mark_read(&self, id: u64) -> bool {
        let found = {
            let mut store = self.store.borrow_mut();
            match store.items.iter_mut().find(|item| item.id == id) {
                Some(item) => {
                    item.state = ReadState::Read;
                    true
                }
                None => false,
            }
        };
        if found {
            self.notify();
        }
        found
    }

    pub fn remove(&self, id: u64) -> bool {
        let found = {
            let mut store = self.store.borrow_mut();
            let before = store.items.len();
            store.items.retain(|item| item.id != id);
            store.items.len() != before
        };
        if found {
            self.notify();
        }
        found
    }

    /// Unread items currently stored for `owner`.
    #[must_use]
    pub fn unread_for(&self, owner: &str) -> usize {
        Identity::new(owner).map_or(0, |owner| {
            self.store.borrow().len_for(&FeedFilter::unread(owner))
        })
    }

    /// While held, opens wait until [`release_held`](Self::release_held).
    pub fn hold_opens(&self, hold: bool) {
        self.store.borrow_mut().hold = hold;
    }

    /// Let every held open resolve. Returns how many were waiting.
    pub fn release_held(&self) -> usize {
        let held = std::mem::take(&mut self.store.borrow_mut().held);
        let n = held.len();
        for gate in held {
            let _ = gate.send(());
        }
        n
    }

    #[must_use]
    pub fn held_count(&self) -> usize {
        self.store.borrow().held.len()
    }

    /// Make the next open fail with `err`.
    pub fn fail_next_open(&self, err: FeedError) {
        self.store.borrow_mut().failures.push_back(err);
    }

    #[must_use]
    pub fn live_query_count(&self) -> usize {
        self.store.borrow().queries.len()
    }

    /// Owners of the live queries, in open order.
    #[must_use]
    pub fn live_owners(&self) -> Vec<String> {
        self.store
            .borrow()
            .queries
            .iter()
            .map(|q| q.filter.owner.as_str().to_string())
            .collect()
    }

    #[must_use]
    pub fn opened_total(&self) -> u64 {
        self.store.borrow().opened_total
    }

    #[must_use]
    pub fn cancelled_total(&self) -> u64 {
        self.store.borrow().cancelled_total
    }

    fn notify(&self) {
        let changed = self.store.borrow_mut().changed_sinks();
        for (sink, len) in changed {
            sink(len);
        }
    }
}

impl FeedBackend for MemoryFeed {
    fn open(
        &self,
        filter: FeedFilter,
        sink: ChangeSink,
    ) -> LocalBoxFuture<'static, Result<FeedQuery, FeedError>> {
        let (failure, gate) = {
            let mut store = self.store.borrow_mut();
            let failure = store.failures.pop_front();
            let gate = if store.hold {
                let (tx, rx) = oneshot::channel();
                store.held.push(tx);
                Some(rx)
            } else {
                None
            };
            (failure, gate)
        };
        let store = Rc::clone(&self.store);

        async move {
            if let Some(gate) = gate {
                if gate.await.is_err() {
                    return Err(FeedError::Closed);
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }

            let (id, len) = {
                let mut s = store.borrow_mut();
                let len = s.len_for(&filter);
                let id = s.next_query;
                s.next_query += 1;
                s.opened_total += 1;
                s.queries.push(LiveEntry {
                    id,
                    filter,
                    sink,
                    last_len: len,
                });
                (id, len)
            };
            tracing::trace!(message = "feed.backend.open", query_id = id, len);

            let weak = Rc::downgrade(&store);
            Ok(FeedQuery::new(len, move || {
                if let Some(store) = weak.upgrade() {
                    let mut s = store.borrow_mut();
                    let before = s.queries.len();
                    s.queries.retain(|q| q.id != id);
                    if s.queries.len() != before {
                        s.cancelled_total += 1;
                    }
                }
            }))
        }
        .boxed_local()
    }
}

impl fmt::Debug for MemoryFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.borrow();
        f.debug_struct("MemoryFeed")
            .field("items", &store.items.len())
            .field("live_queries", &store.queries.len())
            .field("held", &store.held.len())
            .field("opened_total", &store.opened_total)
            .field("cancelled_total", &store.cancelled_total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::Cell;

    fn recording_sink() -> (Rc<RefCell<Vec<usize>>>, ChangeSink) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        (seen, Rc::new(move |len| s.borrow_mut().push(len)))
    }

    fn unread(owner: &str) -> FeedFilter {
        FeedFilter::unread(Identity::new(owner).unwrap())
    }

    #[test]
    fn open_snapshots_and_reports_changes() {
        let feed = MemoryFeed::new();
        feed.seed_unread("u1", 2);
        feed.insert_unread("u2");

        let (seen, sink) = recording_sink();
        let query = block_on(feed.open(unread("u1"), sink)).unwrap();
        assert_eq!(query.initial_len(), 2);

        let id = feed.insert_unread("u1");
        feed.insert_unread("u2");
        feed.mark_read(id);
        assert_eq!(*seen.borrow(), vec![3, 2]);
        assert_eq!(feed.live_owners(), vec!["u1"]);
    }

    #[test]
    fn cancel_unregisters_query() {
        let feed = MemoryFeed::new();
        let (seen, sink) = recording_sink();
        let mut query = block_on(feed.open(unread("u1"), sink)).unwrap();
        query.cancel();
        query.cancel();
        feed.insert_unread("u1");

        assert!(seen.borrow().is_empty());
        assert_eq!(feed.live_query_count(), 0);
        assert_eq!(feed.cancelled_total(), 1);
    }

    #[test]
    fn failure_applies_once() {
        let feed = MemoryFeed::new();
        feed.fail_next_open(FeedError::unavailable("down"));
        let (_, sink) = recording_sink();
        assert!(block_on(feed.open(unread("u1"), Rc::clone(&sink))).is_err());
        assert!(block_on(feed.open(unread("u1"), sink)).is_ok());
        assert_eq!(feed.opened_total(), 1);
    }

    #[test]
    fn held_open_waits_for_release() {
        let feed = MemoryFeed::new();
        feed.hold_opens(true);
        let (_, sink) = recording_sink();
        let mut opening = feed.open(unread("u1"), sink);
        assert!((&mut opening).now_or_never().is_none());
        assert_eq!(feed.held_count(), 1);

        assert_eq!(feed.release_held(), 1);
        let query = block_on(opening).unwrap();
        assert!(query.is_active());
        assert_eq!(feed.live_query_count(), 1);
    }

    #[test]
    fn dropped_gate_closes_open() {
        let feed = MemoryFeed::new();
        feed.hold_opens(true);
        let (_, sink) = recording_sink();
        let opening = feed.open(unread("u1"), sink);
        feed.store.borrow_mut().held.clear();
        assert_eq!(block_on(opening).unwrap_err(), FeedError::Closed);
    }

    #[test]
    fn removing_unknown_item_is_noop() {
        let feed = MemoryFeed::new();
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let _query = block_on(feed.open(unread("u1"), Rc::new(move |_| c.set(c.get() + 1))));
        assert!(!feed.remove(42));
        assert!(!feed.mark_read(42));
        assert_eq!(calls.get(), 0);
    }
}
