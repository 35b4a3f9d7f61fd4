#![forbid(unsafe_code)]

//! Unread-count feed: one live query per identity, republished as a stream.
//!
//! [`UnreadFeed::observe`] returns an [`UnreadCounts`] stream. It is lazy:
//! nothing is opened until the first poll (or [`UnreadCounts::start`]). From
//! then on every identity change runs the same protocol:
//!
//! 1. Cancel the live query, if any, synchronously.
//! 2. Absent identity: emit `0` and stop.
//! 3. Otherwise open `{ owner, state: unread }` on the backend and emit the
//!    initial size once it resolves, then every size change after that.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --identity--> Subscribing --opened--> Live --change/teardown--> Canceled --> Idle
//!                        |
//!                        +--open failed--> Idle   (count kept, error emitted)
//! ```
//!
//! # Invariants
//!
//! 1. At most one query is live, and its owner is the most recently observed
//!    non-empty identity.
//! 2. Every open carries a generation number. An open that resolves after
//!    its generation was superseded (identity change or teardown) is
//!    cancelled on the spot and never becomes live.
//! 3. Change reports from a query that is neither live nor the one being
//!    opened are discarded. A report for the open in flight is held and
//!    replaces the initial snapshot when the open settles.
//! 4. A failed open keeps the last count; the error is emitted as
//!    [`SyncError::FeedOpen`] and nothing is retried automatically.
//! 5. Teardown is idempotent and ends the stream.

use std::cell::RefCell;
use std::fmt;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::stream::{Stream, StreamExt};
use futures::task::{LocalSpawn, LocalSpawnExt};
use navsync_core::{
    Activation, FeedError, FeedFilter, Identity, Result, SyncConfig, SyncError, UnreadCount,
};

use crate::dispatch::Subscription;
use crate::host::{ChangeSink, FeedBackend, FeedQuery, IdentitySource};
use crate::reactive::{Computed, Observable};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

type CountItem = std::result::Result<UnreadCount, SyncError>;

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle and stats
// ─────────────────────────────────────────────────────────────────────────────

/// Where the manager is in its subscription lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    #[default]
    Idle,
    Subscribing,
    Live,
    /// Transient: the live query was just cancelled. Always followed by
    /// `Idle` or `Subscribing`.
    Canceled,
}

impl LifecycleState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Subscribing => "subscribing",
            Self::Live => "live",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Opens requested from the backend.
    pub opens: u64,
    pub open_failures: u64,
    /// Live queries cancelled (identity change or teardown).
    pub cancels: u64,
    /// Change reports dropped because their query was not live.
    pub stale_discarded: u64,
    /// Opens that resolved after being superseded and were cancelled.
    pub late_opens_cancelled: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

struct LiveQuery {
    identity: Identity,
    generation: u64,
    query: FeedQuery,
    last_len: usize,
}

struct PendingOpen {
    identity: Identity,
    generation: u64,
    /// Latest size reported between the backend resolving and settling.
    reported_len: Option<usize>,
}

struct SessionInner {
    id: u64,
    dedupe: bool,
    generation: u64,
    pending: Option<PendingOpen>,
    live: Option<LiveQuery>,
    torn_down: bool,
    identity_listener: Option<Subscription>,
    stats: FeedStats,
    tx: Option<UnboundedSender<CountItem>>,
}

struct Session {
    inner: RefCell<SessionInner>,
    count: Observable<UnreadCount>,
    lifecycle: Observable<LifecycleState>,
    backend: Rc<dyn FeedBackend>,
    spawner: Rc<dyn LocalSpawn>,
}

fn apply_identity(session: &Rc<Session>, identity: Option<Identity>, force: bool) {
    let (previous, generation, id) = {
        let mut inner = session.inner.borrow_mut();
        if inner.torn_down {
            return;
        }
        if !force && inner.dedupe {
            if let Some(next) = identity.as_ref() {
                let same_live = inner.live.as_ref().is_some_and(|l| &l.identity == next);
                let same_pending = inner.pending.as_ref().is_some_and(|p| &p.identity == next);
                if same_live || same_pending {
                    tracing::trace!(message = "feed.identity_unchanged", session_id = inner.id, owner = %next);
                    return;
                }
            }
        }
        inner.generation += 1;
        inner.pending = None;
        (inner.live.take(), inner.generation, inner.id)
    };

    if let Some(live) = previous {
        cancel_live(session, live);
    }

    match identity {
        None => {
            session.lifecycle.set(LifecycleState::Idle);
            tracing::debug!(message = "feed.identity_absent", session_id = id, generation);
            publish(session, Ok(UnreadCount::ZERO));
        }
        Some(identity) => open(session, identity, generation),
    }
}

fn open(session: &Rc<Session>, identity: Identity, generation: u64) {
    let id = {
        let mut inner = session.inner.borrow_mut();
        inner.pending = Some(PendingOpen {
            identity: identity.clone(),
            generation,
            reported_len: None,
        });
        inner.stats.opens += 1;
        inner.id
    };
    session.lifecycle.set(LifecycleState::Subscribing);
    tracing::debug!(message = "feed.open", session_id = id, generation, owner = %identity);

    let weak = Rc::downgrade(session);
    let sink: ChangeSink = Rc::new(move |len| {
        if let Some(session) = weak.upgrade() {
            on_feed_change(&session, generation, len);
        }
    });
    let opening = session
        .backend
        .open(FeedFilter::unread(identity.clone()), sink);

    let weak = Rc::downgrade(session);
    let task = async move {
        let result = opening.await;
        match weak.upgrade() {
            Some(session) => settle_open(&session, identity, generation, result),
            None => {
                if let Ok(mut query) = result {
                    query.cancel();
                }
            }
        }
    };

    if let Err(err) = session.spawner.spawn_local(task) {
        {
            let mut inner = session.inner.borrow_mut();
            inner.pending = None;
            inner.stats.open_failures += 1;
        }
        session.lifecycle.set(LifecycleState::Idle);
        tracing::warn!(message = "feed.spawn_failed", session_id = id, error = %err);
        publish(
            session,
            Err(SyncError::Spawn {
                reason: err.to_string(),
            }),
        );
    }
}

fn settle_open(
    session: &Rc<Session>,
    identity: Identity,
    generation: u64,
    result: std::result::Result<FeedQuery, FeedError>,
) {
    let (current, reported_len, id) = {
        let inner = session.inner.borrow();
        let pending = inner
            .pending
            .as_ref()
            .filter(|p| !inner.torn_down && p.generation == generation);
        (
            pending.is_some() && inner.generation == generation,
            pending.and_then(|p| p.reported_len),
            inner.id,
        )
    };

    if !current {
        if let Ok(mut query) = result {
            query.cancel();
            session.inner.borrow_mut().stats.late_opens_cancelled += 1;
            tracing::debug!(message = "feed.late_open_cancelled", session_id = id, generation, owner = %identity);
        }
        return;
    }

    match result {
        Ok(query) => {
            let len = reported_len.unwrap_or_else(|| query.initial_len());
            {
                let mut inner = session.inner.borrow_mut();
                inner.pending = None;
                inner.live = Some(LiveQuery {
                    identity: identity.clone(),
                    generation,
                    query,
                    last_len: len,
                });
            }
            session.lifecycle.set(LifecycleState::Live);
            tracing::debug!(message = "feed.live", session_id = id, generation, owner = %identity, count = len);
            publish(session, Ok(UnreadCount::new(len)));
        }
        Err(source) => {
            {
                let mut inner = session.inner.borrow_mut();
                inner.pending = None;
                inner.stats.open_failures += 1;
            }
            session.lifecycle.set(LifecycleState::Idle);
            tracing::warn!(message = "feed.open_failed", session_id = id, generation, owner = %identity, error = %source);
            publish(
                session,
                Err(SyncError::FeedOpen {
                    owner: identity.to_string(),
                    source,
                }),
            );
        }
    }
}

fn on_feed_change(session: &Rc<Session>, generation: u64, len: usize) {
    let changed = {
        let mut guard = session.inner.borrow_mut();
        let inner = &mut *guard;
        let torn_down = inner.torn_down;
        if let Some(live) = inner.live.as_mut().filter(|l| l.generation == generation) {
            let changed = live.last_len != len;
            live.last_len = len;
            changed
        } else if let Some(pending) = inner
            .pending
            .as_mut()
            .filter(|p| !torn_down && p.generation == generation)
        {
            // Resolved but not yet settled; the settle publishes this size.
            pending.reported_len = Some(len);
            tracing::trace!(message = "feed.change_before_settle", session_id = inner.id, generation, count = len);
            return;
        } else {
            inner.stats.stale_discarded += 1;
            tracing::warn!(message = "feed.stale_change", session_id = inner.id, generation, count = len);
            return;
        }
    };
    if changed {
        publish(session, Ok(UnreadCount::new(len)));
    }
}

fn cancel_live(session: &Session, mut live: LiveQuery) {
    live.query.cancel();
    let id = {
        let mut inner = session.inner.borrow_mut();
        inner.stats.cancels += 1;
        inner.id
    };
    session.lifecycle.set(LifecycleState::Canceled);
    session.lifecycle.set(LifecycleState::Idle);
    tracing::debug!(
        message = "feed.cancel",
        session_id = id,
        generation = live.generation,
        owner = %live.identity
    );
}

fn publish(session: &Session, item: CountItem) {
    if let Ok(count) = &item {
        session.count.set(*count);
    }
    if let Some(tx) = session.inner.borrow().tx.as_ref() {
        // A closed receiver means nobody is listening any more.
        let _ = tx.unbounded_send(item);
    }
}

fn teardown(session: &Session) {
    let (live, listener, tx, id) = {
        let mut inner = session.inner.borrow_mut();
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;
        inner.generation += 1;
        inner.pending = None;
        (
            inner.live.take(),
            inner.identity_listener.take(),
            inner.tx.take(),
            inner.id,
        )
    };
    drop(listener);
    match live {
        Some(live) => cancel_live(session, live),
        None => {
            session.lifecycle.set(LifecycleState::Idle);
        }
    }
    drop(tx);
    tracing::debug!(message = "feed.teardown", session_id = id);
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Factory for [`UnreadCounts`] streams over one backend.
pub struct UnreadFeed {
    backend: Rc<dyn FeedBackend>,
    spawner: Rc<dyn LocalSpawn>,
    dedupe: bool,
}

impl UnreadFeed {
    /// `spawner` runs the open futures; it must be driven on the same thread.
    pub fn new(backend: Rc<dyn FeedBackend>, spawner: Rc<dyn LocalSpawn>) -> Self {
        Self {
            backend,
            spawner,
            dedupe: SyncConfig::default().dedupe_identity,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.dedupe = config.dedupe_identity;
        self
    }

    /// Lazy stream of unread counts for whoever `source` says is signed in.
    pub fn observe(&self, source: Rc<dyn IdentitySource>) -> UnreadCounts {
        let (tx, rx) = mpsc::unbounded();
        let session = Rc::new(Session {
            inner: RefCell::new(SessionInner {
                id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
                dedupe: self.dedupe,
                generation: 0,
                pending: None,
                live: None,
                torn_down: false,
                identity_listener: None,
                stats: FeedStats::default(),
                tx: Some(tx),
            }),
            count: Observable::new(UnreadCount::ZERO),
            lifecycle: Observable::new(LifecycleState::Idle),
            backend: Rc::clone(&self.backend),
            spawner: Rc::clone(&self.spawner),
        });
        UnreadCounts {
            session,
            rx,
            source,
            started: false,
        }
    }

    /// Like [`observe`](Self::observe), but torn down when `scope` is released.
    pub fn observe_in(&self, scope: &Activation, source: Rc<dyn IdentitySource>) -> UnreadCounts {
        let counts = self.observe(source);
        let weak = Rc::downgrade(&counts.session);
        scope.on_release(move || {
            if let Some(session) = weak.upgrade() {
                teardown(&session);
            }
        });
        counts
    }
}

impl fmt::Debug for UnreadFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnreadFeed")
            .field("dedupe", &self.dedupe)
            .finish_non_exhaustive()
    }
}

/// Stream of unread counts (or feed errors) for one activation.
///
/// Dropping it tears the subscription down.
pub struct UnreadCounts {
    session: Rc<Session>,
    rx: UnboundedReceiver<CountItem>,
    source: Rc<dyn IdentitySource>,
    started: bool,
}

impl UnreadCounts {
    /// Begin watching the identity source. Polling the stream does this
    /// implicitly; calling it again is a no-op.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        if self.session.inner.borrow().torn_down {
            return;
        }

        let weak = Rc::downgrade(&self.session);
        let listener = self.source.on_change(Box::new(move |identity: &Option<Identity>| {
            if let Some(session) = weak.upgrade() {
                apply_identity(&session, identity.clone(), false);
            }
        }));
        self.session.inner.borrow_mut().identity_listener = Some(listener);
        apply_identity(&self.session, self.source.current(), false);
    }

    /// Re-apply the current identity, reopening the feed even if it is the
    /// same one. This is the retry path after a failed open.
    pub fn reactivate(&mut self) -> Result<()> {
        let (torn_down, id) = {
            let inner = self.session.inner.borrow();
            (inner.torn_down, inner.id)
        };
        if torn_down {
            return Err(SyncError::Released { scope_id: id });
        }
        if !self.started {
            self.start();
            return Ok(());
        }
        tracing::debug!(message = "feed.reactivate", session_id = id);
        apply_identity(&self.session, self.source.current(), true);
        Ok(())
    }

    /// Cancel the live query (or the one being opened) and end the stream.
    /// Idempotent.
    pub fn cancel(&self) {
        teardown(&self.session);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.session.inner.borrow().torn_down
    }

    /// Most recent successfully reported count.
    #[must_use]
    pub fn latest(&self) -> UnreadCount {
        self.session.count.get()
    }

    /// Read-only view of the latest count.
    #[must_use]
    pub fn count(&self) -> Computed<UnreadCount> {
        Computed::from_observable(&self.session.count, |c| *c)
    }

    pub fn on_count_change(&self, f: impl Fn(UnreadCount) + 'static) -> Subscription {
        self.session.count.subscribe(move |c| f(*c))
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.session.lifecycle.get()
    }

    /// Called on every lifecycle transition, including the transient
    /// `Canceled` step.
    pub fn on_state_change(&self, f: impl Fn(LifecycleState) + 'static) -> Subscription {
        self.session.lifecycle.subscribe(move |s| f(*s))
    }

    /// Owner of the live query, if one is live.
    #[must_use]
    pub fn live_identity(&self) -> Option<Identity> {
        self.session
            .inner
            .borrow()
            .live
            .as_ref()
            .map(|l| l.identity.clone())
    }

    #[must_use]
    pub fn stats(&self) -> FeedStats {
        self.session.inner.borrow().stats
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.session.inner.borrow().generation
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.session.inner.borrow().id
    }
}

impl Stream for UnreadCounts {
    type Item = CountItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.start();
        self.rx.poll_next_unpin(cx)
    }
}

impl Drop for UnreadCounts {
    fn drop(&mut self) {
        teardown(&self.session);
    }
}

impl fmt::Debug for UnreadCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.session.inner.borrow();
        f.debug_struct("UnreadCounts")
            .field("id", &inner.id)
            .field("state", &self.session.lifecycle.get())
            .field("generation", &inner.generation)
            .field("latest", &self.session.count.get())
            .field("stats", &inner.stats)
            .finish()
    }
}
