#![forbid(unsafe_code)]

//! Seams to the hosting environment.
//!
//! The runtime never talks to a real browser history, identity provider, or
//! database. It goes through three traits:
//!
//! - [`NavigationHost`]: current location, history-change signal, and the
//!   two transition actions (full reload or soft re-render).
//! - [`IdentitySource`]: the currently signed-in identity and its changes.
//! - [`FeedBackend`]: opens a live "unread items for owner X" query.
//!
//! All three are object-safe and used behind `Rc<dyn ..>`.

use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use navsync_core::{FeedError, FeedFilter, Identity, Location, NavigationEvent};

use crate::dispatch::Subscription;
use crate::reactive::Observable;

/// Browser-history style host.
pub trait NavigationHost {
    /// Location the host is currently displaying.
    fn location(&self) -> Location;

    /// Register for history changes. Events arrive in host order.
    fn on_history_change(&self, listener: Box<dyn Fn(&NavigationEvent)>) -> Subscription;

    /// Full reload of the view.
    fn reload(&self);

    /// Re-render in place for `location` without reloading.
    fn soft_transition(&self, location: &Location);

    /// Programmatic navigation. Hosts report it back as a push event.
    fn push(&self, location: &Location);
}

/// Source of the signed-in identity.
pub trait IdentitySource {
    fn current(&self) -> Option<Identity>;

    fn on_change(&self, listener: Box<dyn Fn(&Option<Identity>)>) -> Subscription;
}

impl IdentitySource for Observable<Option<Identity>> {
    fn current(&self) -> Option<Identity> {
        self.get()
    }

    fn on_change(&self, listener: Box<dyn Fn(&Option<Identity>)>) -> Subscription {
        self.subscribe(listener)
    }
}

/// Callback through which a live query reports its new result size.
pub type ChangeSink = Rc<dyn Fn(usize)>;

/// Backend able to open live unread-item queries.
pub trait FeedBackend {
    /// Open a live query for `filter`.
    ///
    /// The future resolves once the initial snapshot is known. After that,
    /// every change to the result size is reported through `sink` until the
    /// returned [`FeedQuery`] is cancelled or dropped.
    fn open(
        &self,
        filter: FeedFilter,
        sink: ChangeSink,
    ) -> LocalBoxFuture<'static, Result<FeedQuery, FeedError>>;
}

/// An open live query. Cancelling (or dropping) it stops change reports.
pub struct FeedQuery {
    initial_len: usize,
    guard: Subscription,
}

impl FeedQuery {
    pub fn new(initial_len: usize, cancel: impl FnOnce() + 'static) -> Self {
        Self {
            initial_len,
            guard: Subscription::new(cancel),
        }
    }

    /// Result size at the moment the query opened.
    #[must_use]
    pub fn initial_len(&self) -> usize {
        self.initial_len
    }

    pub fn cancel(&mut self) {
        self.guard.cancel();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.guard.is_active()
    }
}

impl fmt::Debug for FeedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedQuery")
            .field("initial_len", &self.initial_len)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn observable_identity_source_reports_changes() {
        let source = Observable::new(Identity::new("u1"));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = source.on_change(Box::new(move |id: &Option<Identity>| {
            s.borrow_mut().push(id.as_ref().map(|i| i.as_str().to_string()));
        }));

        assert_eq!(IdentitySource::current(&source), Identity::new("u1"));
        source.set(None);
        source.set(Identity::new("u2"));
        assert_eq!(*seen.borrow(), vec![None, Some("u2".to_string())]);
    }

    #[test]
    fn query_cancels_once_on_drop() {
        let cancelled = Rc::new(Cell::new(0));
        let c = Rc::clone(&cancelled);
        let mut query = FeedQuery::new(3, move || c.set(c.get() + 1));
        assert_eq!(query.initial_len(), 3);
        assert!(query.is_active());
        query.cancel();
        assert!(!query.is_active());
        drop(query);
        assert_eq!(cancelled.get(), 1);
    }
}
