#![forbid(unsafe_code)]

//! Reactive values exposed to the hosting view.
//!
//! - [`Observable`]: a shared, version-tracked value with change
//!   notification. Holds tracker state, the unread count, and lifecycle
//!   state; also serves as an in-process identity source.
//! - [`Computed`]: a lazily-evaluated, memoized read-only projection of an
//!   `Observable`, used to hand out the current location and unread count
//!   without giving consumers write access.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. Dropping a [`Subscription`](crate::dispatch::Subscription) removes the
//!    callback before the next notification.
//! 5. `Computed::get()` never returns a stale value.

pub mod computed;
pub mod observable;

pub use computed::Computed;
pub use observable::Observable;
