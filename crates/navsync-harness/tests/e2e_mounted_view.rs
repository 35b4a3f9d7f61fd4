//! End-to-end scenarios: a view mounts the tracker and the unread feed over
//! the in-memory host and backend, and we watch what the consumer sees.

use std::rc::Rc;

use futures::executor::LocalPool;
use navsync_core::{FeedError, Identity, ReloadPolicy, SyncConfig, SyncError, UnreadCount};
use navsync_harness::{Entry, MemoryFeed, MemoryHost, Transcript, drain_ready, ok_counts};
use navsync_runtime::{LifecycleState, MountedView, Observable, UnreadFeed};
use pretty_assertions::assert_eq;

struct Setup {
    pool: LocalPool,
    host: Rc<MemoryHost>,
    feed: MemoryFeed,
    identity: Observable<Option<Identity>>,
    manager: UnreadFeed,
}

fn setup(history: &[&str], identity: Option<&str>) -> Setup {
    let pool = LocalPool::new();
    let feed = MemoryFeed::new();
    let manager = UnreadFeed::new(Rc::new(feed.clone()), Rc::new(pool.spawner()));
    Setup {
        pool,
        host: Rc::new(MemoryHost::with_history(history.iter().copied())),
        feed,
        identity: Observable::new(identity.and_then(Identity::new)),
        manager,
    }
}

impl Setup {
    fn mount(&self, config: &SyncConfig) -> MountedView {
        MountedView::mount(
            config,
            self.host.clone(),
            Rc::new(self.identity.clone()),
            &self.manager,
        )
    }
}

// ── Identity scenarios ───────────────────────────────────────────────

#[test]
fn identity_switch_then_sign_out() {
    let mut s = setup(&["/"], Some("u1"));
    s.feed.seed_unread("u1", 3);
    let mut view = s.mount(&SyncConfig::default());

    assert_eq!(ok_counts(&drain_ready(&mut s.pool, view.counts())), vec![3]);

    s.identity.set(Identity::new("u2"));
    assert_eq!(s.feed.cancelled_total(), 1);
    assert_eq!(ok_counts(&drain_ready(&mut s.pool, view.counts())), vec![0]);
    assert_eq!(s.feed.live_owners(), vec!["u2"]);

    s.identity.set(None);
    assert_eq!(ok_counts(&drain_ready(&mut s.pool, view.counts())), vec![0]);
    assert_eq!(s.feed.live_query_count(), 0);
    assert_eq!(view.counts().state(), LifecycleState::Idle);
}

#[test]
fn live_changes_stream_through() {
    let mut s = setup(&["/"], Some("u1"));
    let mut view = s.mount(&SyncConfig::default());
    drain_ready(&mut s.pool, view.counts());

    let first = s.feed.insert_unread("u1");
    s.feed.insert_unread("u1");
    s.feed.insert_unread("someone-else");
    s.feed.mark_read(first);
    s.feed.remove(first);

    assert_eq!(
        ok_counts(&drain_ready(&mut s.pool, view.counts())),
        vec![1, 2, 1]
    );
}

#[test]
fn failed_open_keeps_count_and_waits_for_retry() {
    let mut s = setup(&["/"], Some("u1"));
    s.feed.seed_unread("u1", 4);
    s.feed.seed_unread("u2", 2);
    let mut view = s.mount(&SyncConfig::default());
    drain_ready(&mut s.pool, view.counts());

    s.feed.fail_next_open(FeedError::unavailable("connection reset"));
    s.identity.set(Identity::new("u2"));
    let items = drain_ready(&mut s.pool, view.counts());

    assert_eq!(items.len(), 1);
    assert!(matches!(
        &items[0],
        Err(SyncError::FeedOpen { owner, source: FeedError::Unavailable { .. } }) if owner == "u2"
    ));
    assert_eq!(view.counts().latest(), UnreadCount::new(4));
    assert_eq!(view.counts().state(), LifecycleState::Idle);

    // No automatic retry.
    s.pool.run_until_stalled();
    assert_eq!(s.feed.opened_total(), 1);

    view.counts().reactivate().unwrap();
    assert_eq!(ok_counts(&drain_ready(&mut s.pool, view.counts())), vec![2]);
    assert_eq!(s.feed.live_owners(), vec!["u2"]);
}

#[test]
fn unmount_while_subscribing_leaks_nothing() {
    let mut s = setup(&["/"], Some("u1"));
    s.feed.hold_opens(true);
    let mut view = s.mount(&SyncConfig::default());
    drain_ready(&mut s.pool, view.counts());
    assert_eq!(view.counts().state(), LifecycleState::Subscribing);

    view.unmount();
    assert!(!view.is_mounted());
    assert_eq!(s.feed.release_held(), 1);
    s.pool.run_until_stalled();

    assert_eq!(s.feed.live_query_count(), 0);
    assert_eq!(view.counts().stats().late_opens_cancelled, 1);
    assert!(drain_ready(&mut s.pool, view.counts()).is_empty());
}

// ── Navigation scenarios ─────────────────────────────────────────────

#[test]
fn back_to_root_reloads_and_unmount_detaches() {
    let mut s = setup(&["/", "/dashboard"], None);
    let mut view = s.mount(&SyncConfig::default());
    assert_eq!(ok_counts(&drain_ready(&mut s.pool, view.counts())), vec![0]);
    assert_eq!(s.host.listener_count(), 1);

    assert!(s.host.back());
    assert_eq!(s.host.reload_count(), 1);
    assert_eq!(view.tracker().current().path(), "/");

    assert!(s.host.forward());
    assert_eq!(s.host.soft_transitions().len(), 1);

    drop(view);
    assert_eq!(s.host.listener_count(), 0);
    assert!(s.host.back());
    assert_eq!(s.host.reload_count(), 1);
}

#[test]
fn never_policy_only_soft_transitions() {
    let s = setup(&["/", "/dashboard"], None);
    let view = s.mount(&SyncConfig::default().with_reload_policy(ReloadPolicy::Never));

    assert!(s.host.back());
    assert_eq!(s.host.reload_count(), 0);
    assert_eq!(view.tracker().last_transition().map(|t| t.as_str()), Some("soft"));
}

// ── Transcript ───────────────────────────────────────────────────────

#[test]
fn transcript_captures_view_activity() {
    let mut s = setup(&["/", "/orders"], Some("u1"));
    s.feed.seed_unread("u1", 2);
    let mut view = s.mount(&SyncConfig::default());

    let mut transcript = Transcript::new();
    transcript.attach_tracker(view.tracker());
    transcript.attach_counts(view.counts());

    for item in drain_ready(&mut s.pool, view.counts()) {
        transcript.record_item(&item);
    }
    s.host.back();
    s.feed.fail_next_open(FeedError::unavailable("offline"));
    s.identity.set(Identity::new("u2"));
    for item in drain_ready(&mut s.pool, view.counts()) {
        transcript.record_item(&item);
    }
    transcript.detach();
    view.unmount();

    let entries = transcript.entries();
    assert_eq!(
        entries,
        vec![
            Entry::State {
                state: LifecycleState::Live
            },
            Entry::Count { count: 2 },
            Entry::Location { path: "/".into() },
            Entry::State {
                state: LifecycleState::Canceled
            },
            Entry::State {
                state: LifecycleState::Idle
            },
            Entry::State {
                state: LifecycleState::Subscribing
            },
            Entry::State {
                state: LifecycleState::Idle
            },
            Entry::Error {
                message: "failed to open unread feed for u2: feed backend unavailable: offline"
                    .into()
            },
        ]
    );

    for line in transcript.to_jsonl().lines() {
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(parsed["kind"].is_string());
    }
}
