#![forbid(unsafe_code)]

//! Core: locations, reload policy, identities, activation scopes, and config.
//!
//! Everything in this crate is plain data or single-threaded bookkeeping. The
//! event-driven components that consume these types live in
//! `navsync-runtime`.

pub mod activation;
pub mod config;
pub mod error;
pub mod identity;
pub mod location;
pub mod logging;
pub mod policy;

pub use activation::{Activation, ActivationController};
pub use config::SyncConfig;
pub use error::{FeedError, Result, SyncError};
pub use identity::{FeedFilter, Identity, ReadState, UnreadCount};
pub use location::{Location, NavigationEvent, NavigationKind, ROOT_PATH, TrackerState};
pub use policy::{ReloadPolicy, Transition};
