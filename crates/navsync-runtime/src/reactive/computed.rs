#![forbid(unsafe_code)]

//! Lazy read-only projections of an [`Observable`].
//!
//! # Design
//!
//! [`Computed<T>`] wraps a compute function and its cached result in shared,
//! reference-counted storage. When the source changes, the cached value is
//! marked dirty; the next [`get()`](Computed::get) recomputes and caches.
//!
//! # Invariants
//!
//! 1. `get()` always returns a value consistent with the source (no stale
//!    reads after a source mutation completes).
//! 2. The compute function runs at most once per source change.
//! 3. Version increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Source dropped**: the dirty-marking subscription becomes inert; the
//!   computed keeps serving reads through its own source handle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::observable::Observable;
use crate::dispatch::Subscription;

struct ComputedInner<T> {
    compute: Box<dyn Fn() -> T>,
    cached: Option<T>,
    dirty: Cell<bool>,
    version: u64,
    _subscriptions: Vec<Subscription>,
}

impl<T> ComputedInner<T> {
    fn refresh(&mut self) -> &T {
        if self.dirty.replace(false) {
            self.cached = None;
        }
        if self.cached.is_none() {
            self.version += 1;
        }
        let compute = &self.compute;
        self.cached.get_or_insert_with(|| compute())
    }
}

/// A memoized value derived from an [`Observable`].
///
/// Cloning a `Computed` creates a new handle to the **same** inner state.
pub struct Computed<T> {
    inner: Rc<RefCell<ComputedInner<T>>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Computed")
            .field("cached", &inner.cached)
            .field("dirty", &inner.dirty.get())
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Derive a value from `source` through `map`.
    pub fn from_observable<S: Clone + PartialEq + 'static>(
        source: &Observable<S>,
        map: impl Fn(&S) -> T + 'static,
    ) -> Self {
        let reader = source.clone();
        let computed = Self::from_fn(move || reader.with(&map), Vec::new());

        let weak = Rc::downgrade(&computed.inner);
        let sub = source.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.borrow().dirty.set(true);
            }
        });
        computed.inner.borrow_mut()._subscriptions.push(sub);
        computed
    }

    /// Low-level constructor: the caller wires up the subscriptions that
    /// call [`invalidate`](Self::invalidate).
    pub fn from_fn(compute: impl Fn() -> T + 'static, subscriptions: Vec<Subscription>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ComputedInner {
                compute: Box::new(compute),
                cached: None,
                dirty: Cell::new(true),
                version: 0,
                _subscriptions: subscriptions,
            })),
        }
    }

    /// Current value, recomputed if the source changed.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow_mut().refresh().clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` calls back into the same `Computed` (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let mut inner = self.inner.borrow_mut();
        f(inner.refresh())
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.borrow().dirty.get()
    }

    /// Force the next `get()` to recompute.
    pub fn invalidate(&self) {
        self.inner.borrow().dirty.set(true);
    }

    /// Increments by 1 on each recomputation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
