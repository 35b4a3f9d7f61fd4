#![forbid(unsafe_code)]

//! In-memory navigation host with a browser-style history stack.
//!
//! Back/forward traversals fire `pop` signals, [`NavigationHost::push`]
//! fires `push` signals, and every reload or soft transition the tracker
//! requests is logged for assertions.

use std::cell::RefCell;
use std::fmt;

use navsync_core::{Location, NavigationEvent};
use navsync_runtime::{EventBus, NavigationHost, Subscription};

struct HostState {
    entries: Vec<Location>,
    index: usize,
    reloads: Vec<Location>,
    soft: Vec<Location>,
}

/// History stack plus reload/soft-transition logs.
///
/// Signals are always emitted after the internal borrow is released, so
/// listeners may call back into the host.
pub struct MemoryHost {
    state: RefCell<HostState>,
    bus: EventBus<NavigationEvent>,
}

impl MemoryHost {
    #[must_use]
    pub fn new(initial: impl Into<Location>) -> Self {
        Self {
            state: RefCell::new(HostState {
                entries: vec![initial.into()],
                index: 0,
                reloads: Vec::new(),
                soft: Vec::new(),
            }),
            bus: EventBus::new(),
        }
    }

    /// Host whose history already holds `paths`, positioned on the last one.
    ///
    /// An empty list starts at the root.
    #[must_use]
    pub fn with_history<I, L>(paths: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Location>,
    {
        let mut entries: Vec<Location> = paths.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            entries.push(Location::root());
        }
        let index = entries.len() - 1;
        Self {
            state: RefCell::new(HostState {
                entries,
                index,
                reloads: Vec::new(),
                soft: Vec::new(),
            }),
            bus: EventBus::new(),
        }
    }

    /// Traverse one entry back. Returns false at the start of history.
    pub fn back(&self) -> bool {
        self.go(-1)
    }

    /// Traverse one entry forward. Returns false at the end of history.
    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// Traverse `delta` entries and fire a pop signal for the landing entry.
    /// Out-of-range or zero deltas do nothing.
    pub fn go(&self, delta: isize) -> bool {
        let landed = {
            let mut state = self.state.borrow_mut();
            let target = state.index as isize + delta;
            if delta == 0 || target < 0 || target as usize >= state.entries.len() {
                return false;
            }
            state.index = target as usize;
            state.entries[state.index].clone()
        };
        tracing::trace!(message = "host.pop", delta, to = %landed);
        self.bus.emit(&NavigationEvent::Pop { location: landed });
        true
    }

    /// Fire a pop signal that lands on `path`, replacing the current entry.
    pub fn pop_to(&self, path: impl Into<Location>) {
        let landed = path.into();
        {
            let mut state = self.state.borrow_mut();
            let index = state.index;
            state.entries[index] = landed.clone();
        }
        tracing::trace!(message = "host.pop", to = %landed);
        self.bus.emit(&NavigationEvent::Pop { location: landed });
    }

    #[must_use]
    pub fn reload_count(&self) -> usize {
        self.state.borrow().reloads.len()
    }

    /// Location displayed at each reload, in order.
    #[must_use]
    pub fn reloads(&self) -> Vec<Location> {
        self.state.borrow().reloads.clone()
    }

    #[must_use]
    pub fn soft_transitions(&self) -> Vec<Location> {
        self.state.borrow().soft.clone()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.bus.listener_count()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<Location> {
        self.state.borrow().entries.clone()
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.state.borrow().index
    }
}

impl NavigationHost for MemoryHost {
    fn location(&self) -> Location {
        let state = self.state.borrow();
        state.entries[state.index].clone()
    }

    fn on_history_change(&self, listener: Box<dyn Fn(&NavigationEvent)>) -> Subscription {
        self.bus.listen(listener)
    }

    fn reload(&self) {
        let mut state = self.state.borrow_mut();
        let at = state.entries[state.index].clone();
        state.reloads.push(at);
    }

    fn soft_transition(&self, location: &Location) {
        self.state.borrow_mut().soft.push(location.clone());
    }

    fn push(&self, location: &Location) {
        {
            let mut state = self.state.borrow_mut();
            let keep = state.index + 1;
            state.entries.truncate(keep);
            state.entries.push(location.clone());
            state.index = keep;
        }
        tracing::trace!(message = "host.push", to = %location);
        self.bus.emit(&NavigationEvent::Push {
            location: location.clone(),
        });
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryHost")
            .field("entries", &state.entries)
            .field("index", &state.index)
            .field("reloads", &state.reloads.len())
            .field("soft", &state.soft.len())
            .finish()
    }
}
