#![forbid(unsafe_code)]

//! Deterministic stream pumping on a [`LocalPool`].

use futures::FutureExt;
use futures::executor::LocalPool;
use futures::stream::{Stream, StreamExt};
use navsync_core::{SyncError, UnreadCount};

/// Collect every item `stream` can produce without outside input.
///
/// Alternates between polling the stream and running spawned tasks until
/// neither makes progress. Stops early if the stream ends.
pub fn drain_ready<S>(pool: &mut LocalPool, stream: &mut S) -> Vec<S::Item>
where
    S: Stream + Unpin,
{
    let mut out = Vec::new();
    loop {
        if let Some(Some(item)) = stream.next().now_or_never() {
            out.push(item);
            continue;
        }
        pool.run_until_stalled();
        match stream.next().now_or_never() {
            Some(Some(item)) => out.push(item),
            _ => break,
        }
    }
    out
}

/// Successful counts, in order; errors are skipped.
#[must_use]
pub fn ok_counts(items: &[Result<UnreadCount, SyncError>]) -> Vec<usize> {
    items
        .iter()
        .filter_map(|item| item.as_ref().ok().map(|c| c.get()))
        .collect()
}
