#![forbid(unsafe_code)]

//! navsync public facade crate.
//!
//! Location tracking with a configurable reload policy, plus a live
//! unread-count feed that follows the signed-in identity.

pub use navsync_core::{FeedError, Result, SyncConfig, SyncError};

pub mod prelude {
    pub use navsync_core as core;
    #[cfg(feature = "runtime")]
    pub use navsync_runtime as runtime;

    pub use navsync_core::{
        Activation, Identity, Location, NavigationEvent, ReloadPolicy, SyncConfig, Transition,
        UnreadCount,
    };
    #[cfg(feature = "runtime")]
    pub use navsync_runtime::{
        FeedBackend, IdentitySource, LifecycleState, MountedView, NavigationHost, TrackerHandle,
        UnreadCounts, UnreadFeed,
    };
}
