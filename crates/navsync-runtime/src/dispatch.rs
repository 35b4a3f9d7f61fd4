#![forbid(unsafe_code)]

//! Ordered event dispatch with RAII subscriptions.
//!
//! [`EventBus<T>`] is the registry behind every listener in the runtime:
//! host history signals, observable change notification, and identity
//! changes all flow through it. [`Subscription`] is the cleanup half: it
//! runs its cancel action exactly once, on [`Subscription::cancel`] or on
//! drop.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. A listener whose subscription is cancelled is never invoked again,
//!    including later in a dispatch that is already running.
//! 3. A listener registered during a dispatch is first invoked on the next
//!    dispatch.
//! 4. Cancelling a subscription twice is a no-op.
//!
//! # Failure Modes
//!
//! - **Bus dropped first**: outstanding subscriptions become inert; cancelling
//!   them later does nothing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;

struct Listener<T> {
    id: u64,
    alive: Rc<Cell<bool>>,
    callback: Callback<T>,
}

struct Registry<T> {
    next_id: u64,
    listeners: Vec<Listener<T>>,
}

/// Single-threaded, ordered listener registry.
///
/// Cloning an `EventBus` creates a new handle to the **same** registry.
pub struct EventBus<T> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.registry.borrow().listeners.len())
            .finish()
    }
}

impl<T: 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> EventBus<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register `callback`; it stays registered until the returned
    /// subscription is cancelled or dropped.
    pub fn listen(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let alive = Rc::new(Cell::new(true));
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push(Listener {
                id,
                alive: Rc::clone(&alive),
                callback: Rc::new(callback),
            });
            id
        };

        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.registry);
        Subscription::new(move || {
            alive.set(false);
            if let Some(registry) = weak.upgrade() {
                registry.borrow_mut().listeners.retain(|l| l.id != id);
            }
        })
    }

    /// Deliver `event` to every live listener. Returns how many were invoked.
    pub fn emit(&self, event: &T) -> usize {
        // Snapshot so listeners may (un)subscribe while we iterate.
        let snapshot: Vec<(Rc<Cell<bool>>, Callback<T>)> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .map(|l| (Rc::clone(&l.alive), Rc::clone(&l.callback)))
            .collect();

        let mut delivered = 0;
        for (alive, callback) in snapshot {
            if alive.get() {
                callback(event);
                delivered += 1;
            }
        }
        tracing::trace!(message = "dispatch.emit", delivered);
        delivered
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listener_count() == 0
    }
}

/// RAII guard that runs its cancel action exactly once.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to cancel.
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    /// Run the cancel action if it has not run yet.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, EventBus<String>) {
        (Rc::new(RefCell::new(Vec::new())), EventBus::new())
    }

    #[test]
    fn delivers_in_registration_order() {
        let (log, bus) = recorder();
        let l1 = Rc::clone(&log);
        let _a = bus.listen(move |e: &String| l1.borrow_mut().push(format!("a:{e}")));
        let l2 = Rc::clone(&log);
        let _b = bus.listen(move |e: &String| l2.borrow_mut().push(format!("b:{e}")));

        assert_eq!(bus.emit(&"x".to_string()), 2);
        assert_eq!(*log.borrow(), vec!["a:x", "b:x"]);
    }

    #[test]
    fn drop_unsubscribes() {
        let (log, bus) = recorder();
        let l = Rc::clone(&log);
        let sub = bus.listen(move |e: &String| l.borrow_mut().push(e.clone()));
        assert_eq!(bus.listener_count(), 1);
        drop(sub);
        assert!(bus.is_empty());
        assert_eq!(bus.emit(&"x".to_string()), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn double_cancel_is_noop() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let mut sub = Subscription::new(move || c.set(c.get() + 1));
        sub.cancel();
        sub.cancel();
        drop(sub);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn inert_subscription_is_inactive() {
        let mut sub = Subscription::inert();
        assert!(!sub.is_active());
        sub.cancel();
    }

    #[test]
    fn cancel_during_dispatch_skips_later_listener() {
        let (log, bus) = recorder();
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let v = Rc::clone(&victim);
        let _first = bus.listen(move |_: &String| {
            if let Some(mut sub) = v.borrow_mut().take() {
                sub.cancel();
            }
        });
        let l = Rc::clone(&log);
        *victim.borrow_mut() = Some(bus.listen(move |e: &String| l.borrow_mut().push(e.clone())));

        assert_eq!(bus.emit(&"x".to_string()), 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_next_emit() {
        let (log, bus) = recorder();
        let late: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let bus_for_listener = bus.clone();
        let late_for_listener = Rc::clone(&late);
        let log_for_listener = Rc::clone(&log);
        let _adder = bus.listen(move |_: &String| {
            let l = Rc::clone(&log_for_listener);
            let sub = bus_for_listener.listen(move |e: &String| l.borrow_mut().push(e.clone()));
            late_for_listener.borrow_mut().push(sub);
        });

        bus.emit(&"first".to_string());
        assert!(log.borrow().is_empty());
        bus.emit(&"second".to_string());
        assert_eq!(*log.borrow(), vec!["second"]);
    }

    #[test]
    fn subscription_outliving_bus_is_inert() {
        let bus: EventBus<u32> = EventBus::new();
        let mut sub = bus.listen(|_| {});
        drop(bus);
        sub.cancel();
        assert!(!sub.is_active());
    }
}
