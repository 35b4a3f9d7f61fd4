#![forbid(unsafe_code)]

//! Location tracker: `(previous, current)` kept in step with host history.
//!
//! [`TrackerHandle::activate`] registers exactly one history listener on the
//! host. Every observed signal advances the tracked state; `pop` signals are
//! then run through the configured [`ReloadPolicy`], which decides between a
//! destructive reload, a soft transition, or nothing at all.
//!
//! # Invariants
//!
//! 1. After each observed signal, `current` is the location that signal
//!    reported and `previous` is the location current before it.
//! 2. The reload decision for a signal uses the state captured at the start
//!    of that signal's handler. Signals are never batched.
//! 3. Two consecutive observations of the same path trigger neither a reload
//!    nor a soft transition.
//! 4. After [`TrackerHandle::release`] the host listener is gone and no
//!    further decisions are made. Releasing twice is a no-op.
//!
//! # Failure Modes
//!
//! - **Host dropped while the tracker is live**: the listener holds only a
//!   weak host reference, so state still advances but no transition action
//!   can be issued.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use navsync_core::{
    Activation, Location, NavigationEvent, NavigationKind, ReloadPolicy, Result, SyncConfig,
    SyncError, TrackerState, Transition,
};

use crate::dispatch::Subscription;
use crate::host::NavigationHost;
use crate::reactive::{Computed, Observable};

static NEXT_TRACKER_ID: AtomicU64 = AtomicU64::new(1);

/// Counters describing what a tracker has observed and decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Signals observed while active (pop and push).
    pub observed: u64,
    pub pushes: u64,
    pub reloads: u64,
    pub soft_transitions: u64,
    /// Pop signals that repeated the current path.
    pub unchanged: u64,
    /// Signals that arrived after release and were dropped.
    pub ignored_after_release: u64,
}

struct TrackerInner {
    id: u64,
    root: String,
    policy: ReloadPolicy,
    released: bool,
    listener: Option<Subscription>,
    stats: TrackerStats,
    last_transition: Option<Transition>,
}

/// Scoped handle to one active location tracker.
///
/// Dropping the handle releases it.
pub struct TrackerHandle {
    inner: Rc<RefCell<TrackerInner>>,
    state: Observable<TrackerState>,
    host: Rc<dyn NavigationHost>,
}

impl TrackerHandle {
    /// Start observing `host` with `initial` as the current location.
    pub fn activate(initial: Location, host: Rc<dyn NavigationHost>, config: &SyncConfig) -> Self {
        let id = NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed);
        let state = Observable::new(TrackerState::new(initial));
        let inner = Rc::new(RefCell::new(TrackerInner {
            id,
            root: config.root_path.clone(),
            policy: config.reload_policy,
            released: false,
            listener: None,
            stats: TrackerStats::default(),
            last_transition: None,
        }));

        let weak_inner = Rc::downgrade(&inner);
        let weak_host = Rc::downgrade(&host);
        let listener_state = state.clone();
        let listener = host.on_history_change(Box::new(move |event: &NavigationEvent| {
            if let Some(inner) = weak_inner.upgrade() {
                observe(&inner, &listener_state, &weak_host, event);
            }
        }));
        inner.borrow_mut().listener = Some(listener);

        tracing::debug!(
            message = "tracker.activate",
            tracker_id = id,
            root = %config.root_path,
            policy = config.reload_policy.as_str()
        );
        Self { inner, state, host }
    }

    /// Like [`activate`](Self::activate), but also released when `scope` is.
    ///
    /// If `scope` is already released the returned handle is released too.
    pub fn activate_in(
        scope: &Activation,
        initial: Location,
        host: Rc<dyn NavigationHost>,
        config: &SyncConfig,
    ) -> Self {
        let handle = Self::activate(initial, host, config);
        let weak = Rc::downgrade(&handle.inner);
        scope.on_release(move || {
            if let Some(inner) = weak.upgrade() {
                release_inner(&inner);
            }
        });
        handle
    }

    /// Stop observing. Idempotent.
    pub fn release(&self) {
        release_inner(&self.inner);
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.borrow().released
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    #[must_use]
    pub fn policy(&self) -> ReloadPolicy {
        self.inner.borrow().policy
    }

    /// Snapshot of `(previous, current)`.
    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.state.get()
    }

    #[must_use]
    pub fn current(&self) -> Location {
        self.state.with(|s| s.current().clone())
    }

    #[must_use]
    pub fn previous(&self) -> Option<Location> {
        self.state.with(|s| s.previous().cloned())
    }

    /// Read-only view of the current location.
    #[must_use]
    pub fn location(&self) -> Computed<Location> {
        Computed::from_observable(&self.state, |s| s.current().clone())
    }

    /// Call `f` with the current location after each change of tracked state.
    pub fn on_location_change(&self, f: impl Fn(&Location) + 'static) -> Subscription {
        self.state.subscribe(move |s| f(s.current()))
    }

    /// Ask the host to push a history entry for `location`.
    ///
    /// Tracked state follows once the host reports the push back.
    pub fn navigate(&self, location: impl Into<Location>) -> Result<()> {
        let id = {
            let inner = self.inner.borrow();
            if inner.released {
                return Err(SyncError::Released { scope_id: inner.id });
            }
            inner.id
        };
        let location = location.into();
        tracing::debug!(message = "tracker.navigate", tracker_id = id, to = %location);
        self.host.push(&location);
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> TrackerStats {
        self.inner.borrow().stats
    }

    /// Decision made for the most recent pop signal.
    #[must_use]
    pub fn last_transition(&self) -> Option<Transition> {
        self.inner.borrow().last_transition
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        release_inner(&self.inner);
    }
}

impl fmt::Debug for TrackerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TrackerHandle")
            .field("id", &inner.id)
            .field("released", &inner.released)
            .field("state", &self.state.get())
            .field("stats", &inner.stats)
            .finish()
    }
}

fn release_inner(inner: &RefCell<TrackerInner>) {
    let (id, listener) = {
        let mut guard = inner.borrow_mut();
        if guard.released {
            return;
        }
        guard.released = true;
        (guard.id, guard.listener.take())
    };
    drop(listener);
    tracing::debug!(message = "tracker.release", tracker_id = id);
}

fn observe(
    inner: &RefCell<TrackerInner>,
    state: &Observable<TrackerState>,
    host: &Weak<dyn NavigationHost>,
    event: &NavigationEvent,
) {
    let (id, root, policy) = {
        let mut guard = inner.borrow_mut();
        if guard.released {
            guard.stats.ignored_after_release += 1;
            return;
        }
        guard.stats.observed += 1;
        (guard.id, guard.root.clone(), guard.policy)
    };

    let next = event.location().clone();
    let before = state.with(|s| s.current().clone());
    state.update(|s| {
        s.advance(next.clone());
    });

    let transition = match event.kind() {
        NavigationKind::Push => {
            inner.borrow_mut().stats.pushes += 1;
            tracing::debug!(
                message = "tracker.observe",
                tracker_id = id,
                kind = "push",
                from = %before,
                to = %next
            );
            return;
        }
        NavigationKind::Pop => policy.decide(&root, &before, &next),
    };

    // No borrow is held here: the host may synchronously signal back.
    if let Some(host) = host.upgrade() {
        match transition {
            Transition::Reload => host.reload(),
            Transition::Soft => host.soft_transition(&next),
            Transition::Unchanged => {}
        }
    }

    {
        let mut guard = inner.borrow_mut();
        match transition {
            Transition::Reload => guard.stats.reloads += 1,
            Transition::Soft => guard.stats.soft_transitions += 1,
            Transition::Unchanged => guard.stats.unchanged += 1,
        }
        guard.last_transition = Some(transition);
    }
    tracing::debug!(
        message = "tracker.observe",
        tracker_id = id,
        kind = "pop",
        from = %before,
        to = %next,
        transition = transition.as_str()
    );
}
