#![forbid(unsafe_code)]

//! Runtime: the event-driven half of navsync.
//!
//! - [`location_tracker`]: keeps `(previous, current)` in step with the
//!   host's history and applies the reload policy to back/forward signals.
//! - [`unread_feed`]: opens, replaces, and tears down the live unread-count
//!   feed as the identity changes, exposed as a [`futures::Stream`].
//! - [`dispatch`] and [`reactive`]: the shared listener/cleanup primitives
//!   both components are built on.
//! - [`view`]: mounts both components under one activation scope.
//!
//! Everything here is single-threaded. Mutual exclusion comes from the
//! host's event ordering, not from locks.

pub mod dispatch;
pub mod host;
pub mod location_tracker;
pub mod reactive;
pub mod unread_feed;
pub mod view;

pub use dispatch::{EventBus, Subscription};
pub use host::{ChangeSink, FeedBackend, FeedQuery, IdentitySource, NavigationHost};
pub use location_tracker::{TrackerHandle, TrackerStats};
pub use reactive::{Computed, Observable};
pub use unread_feed::{FeedStats, LifecycleState, UnreadCounts, UnreadFeed};
pub use view::MountedView;
