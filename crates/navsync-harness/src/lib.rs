#![forbid(unsafe_code)]

//! Deterministic test harness for navsync.
//!
//! - [`MemoryHost`]: history stack with back/forward/go/push and logs of
//!   every reload and soft transition the tracker requested.
//! - [`MemoryFeed`]: notification store serving live unread queries, with
//!   held opens and one-shot failure injection.
//! - [`Transcript`]: ordered JSONL record of a mounted view's observations.
//! - [`drain_ready`]: pumps an unread-count stream on a `LocalPool` until it
//!   stalls.
//!
//! Invariant tests over these live in `tests/`.

pub mod memory_feed;
pub mod memory_host;
pub mod pump;
pub mod transcript;

pub use memory_feed::MemoryFeed;
pub use memory_host::MemoryHost;
pub use pump::{drain_ready, ok_counts};
pub use transcript::{Entry, Transcript};
