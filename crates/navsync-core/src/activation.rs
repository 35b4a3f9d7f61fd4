//! Activation scopes for mounted views.
//!
//! An [`Activation`] is the lifetime of one mounted view. Components started
//! for that view register release hooks on it; releasing the scope through
//! its [`ActivationController`] runs those hooks exactly once, children
//! first. This replaces ambient, process-wide listener registration with
//! scoped acquisition.
//!
//! # Design
//!
//! Scopes are single-threaded (`Rc` inside) because the host delivers every
//! signal on one event queue. `Activation` is cheaply cloneable and
//! read-only; only the controller can release it.
//!
//! # Invariants
//!
//! 1. Release is idempotent: the second call is a no-op and runs no hooks.
//! 2. Releasing a parent releases every live child before the parent's own
//!    hooks run.
//! 3. A hook registered on an already-released scope runs immediately.
//! 4. Dropping the controller does **not** release the scope.
//!
//! # Example
//!
//! ```
//! use navsync_core::activation::Activation;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let (view, ctrl) = Activation::root();
//! let ran = Rc::new(Cell::new(0));
//! let hook = Rc::clone(&ran);
//! view.on_release(move || hook.set(hook.get() + 1));
//!
//! ctrl.release();
//! ctrl.release();
//! assert!(view.is_released());
//! assert_eq!(ran.get(), 1);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use web_time::{Duration, Instant};

use crate::error::{Result, SyncError};
use crate::logging::debug;

// ─── Id generation ───────────────────────────────────────────────────────────

static NEXT_ACTIVATION_ID: AtomicU64 = AtomicU64::new(1);

fn next_activation_id() -> u64 {
    NEXT_ACTIVATION_ID.fetch_add(1, Ordering::Relaxed)
}

// ─── Metrics counters ────────────────────────────────────────────────────────

static RELEASES_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Total number of scope releases observed (for diagnostics).
#[must_use]
pub fn releases_total() -> u64 {
    RELEASES_TOTAL.load(Ordering::Relaxed)
}

// ─── Inner shared state ──────────────────────────────────────────────────────

type ReleaseHook = Box<dyn FnOnce()>;

struct ActivationInner {
    id: u64,
    released: Cell<bool>,
    activated_at: Instant,
    parent: Option<Rc<ActivationInner>>,
    children: RefCell<Vec<Weak<ActivationInner>>>,
    hooks: RefCell<Vec<ReleaseHook>>,
}

impl ActivationInner {
    fn new(parent: Option<Rc<ActivationInner>>) -> Rc<Self> {
        Rc::new(Self {
            id: next_activation_id(),
            released: Cell::new(false),
            activated_at: Instant::now(),
            parent,
            children: RefCell::new(Vec::new()),
            hooks: RefCell::new(Vec::new()),
        })
    }

    fn is_released(&self) -> bool {
        if self.released.get() {
            return true;
        }
        self.parent.as_ref().is_some_and(|parent| parent.is_released())
    }

    fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        RELEASES_TOTAL.fetch_add(1, Ordering::Relaxed);

        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.release();
        }

        let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
        for hook in hooks {
            hook();
        }
        debug!(activation_id = self.id, "activation released");
    }
}

// ─── Activation ──────────────────────────────────────────────────────────────

/// Read-only handle to a view's activation scope.
#[derive(Clone)]
pub struct Activation {
    inner: Rc<ActivationInner>,
}

impl Activation {
    /// Create a root scope.
    #[must_use]
    pub fn root() -> (Self, ActivationController) {
        Self::with_parent(None)
    }

    /// Derive a child scope, released together with this one.
    #[must_use]
    pub fn child(&self) -> (Self, ActivationController) {
        let (child, ctrl) = Self::with_parent(Some(Rc::clone(&self.inner)));
        if self.inner.is_released() {
            ctrl.release();
        } else {
            self.inner
                .children
                .borrow_mut()
                .push(Rc::downgrade(&child.inner));
        }
        (child, ctrl)
    }

    fn with_parent(parent: Option<Rc<ActivationInner>>) -> (Self, ActivationController) {
        let inner = ActivationInner::new(parent);
        let scope = Self {
            inner: Rc::clone(&inner),
        };
        (scope, ActivationController { inner })
    }

    /// Unique identifier for this scope (for logging).
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether this scope or any ancestor has been released.
    #[inline]
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.is_released()
    }

    #[must_use]
    pub fn activated_at(&self) -> Instant {
        self.inner.activated_at
    }

    /// Time since activation.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.inner.activated_at.elapsed()
    }

    /// Run `hook` when the scope is released, or now if it already was.
    pub fn on_release(&self, hook: impl FnOnce() + 'static) {
        if self.inner.is_released() {
            hook();
            return;
        }
        self.inner.hooks.borrow_mut().push(Box::new(hook));
    }

    /// `Ok` while the scope is live.
    pub fn check(&self) -> Result<()> {
        if self.is_released() {
            return Err(SyncError::Released {
                scope_id: self.inner.id,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("id", &self.inner.id)
            .field("released", &self.inner.is_released())
            .field("hooks", &self.inner.hooks.borrow().len())
            .finish()
    }
}

// ─── ActivationController ────────────────────────────────────────────────────

/// Owner-side handle that releases an [`Activation`].
#[derive(Debug)]
pub struct ActivationController {
    inner: Rc<ActivationInner>,
}

impl ActivationController {
    /// Release the scope, its children, and run all hooks. Idempotent.
    pub fn release(&self) {
        self.inner.release();
    }

    /// Whether this scope itself has been released.
    #[inline]
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }
}

impl fmt::Debug for ActivationInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationInner")
            .field("id", &self.id)
            .field("released", &self.released.get())
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
