#![forbid(unsafe_code)]

//! Mounting both components for one view.
//!
//! [`MountedView::mount`] opens a root [`Activation`], activates the location
//! tracker and the unread-count stream inside it, and releases both together
//! on [`MountedView::unmount`] or drop.

use std::fmt;
use std::rc::Rc;

use navsync_core::{Activation, ActivationController, SyncConfig};

use crate::host::{IdentitySource, NavigationHost};
use crate::location_tracker::TrackerHandle;
use crate::unread_feed::{UnreadCounts, UnreadFeed};

pub struct MountedView {
    scope: Activation,
    controller: ActivationController,
    tracker: TrackerHandle,
    counts: UnreadCounts,
}

impl MountedView {
    /// Activate the tracker at the host's current location and start the
    /// unread-count stream for `identity`.
    pub fn mount(
        config: &SyncConfig,
        host: Rc<dyn NavigationHost>,
        identity: Rc<dyn IdentitySource>,
        feed: &UnreadFeed,
    ) -> Self {
        let (scope, controller) = Activation::root();
        let initial = host.location();
        let tracker = TrackerHandle::activate_in(&scope, initial, host, config);
        let mut counts = feed.observe_in(&scope, identity);
        counts.start();
        tracing::debug!(
            message = "view.mount",
            scope_id = scope.id(),
            tracker_id = tracker.id(),
            session_id = counts.id()
        );
        Self {
            scope,
            controller,
            tracker,
            counts,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &TrackerHandle {
        &self.tracker
    }

    pub fn counts(&mut self) -> &mut UnreadCounts {
        &mut self.counts
    }

    #[must_use]
    pub fn scope(&self) -> &Activation {
        &self.scope
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        !self.scope.is_released()
    }

    /// Release the tracker and the unread feed. Idempotent.
    pub fn unmount(&self) {
        if self.controller.is_released() {
            return;
        }
        tracing::debug!(
            message = "view.unmount",
            scope_id = self.scope.id(),
            age = ?self.scope.age()
        );
        self.controller.release();
    }
}

impl Drop for MountedView {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl fmt::Debug for MountedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedView")
            .field("scope", &self.scope)
            .field("tracker", &self.tracker)
            .field("counts", &self.counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{EventBus, Subscription};
    use crate::host::{ChangeSink, FeedBackend, FeedQuery};
    use crate::reactive::Observable;
    use crate::unread_feed::LifecycleState;
    use futures::FutureExt;
    use futures::executor::LocalPool;
    use futures::future::{self, LocalBoxFuture};
    use navsync_core::{FeedError, FeedFilter, Identity, Location, NavigationEvent};
    use std::cell::Cell;

    #[derive(Default)]
    struct StillHost {
        bus: EventBus<NavigationEvent>,
    }

    impl NavigationHost for StillHost {
        fn location(&self) -> Location {
            Location::new("/inbox")
        }

        fn on_history_change(&self, listener: Box<dyn Fn(&NavigationEvent)>) -> Subscription {
            self.bus.listen(listener)
        }

        fn reload(&self) {}

        fn soft_transition(&self, _location: &Location) {}

        fn push(&self, _location: &Location) {}
    }

    #[derive(Default)]
    struct CountingBackend {
        live: Rc<Cell<usize>>,
    }

    impl FeedBackend for CountingBackend {
        fn open(
            &self,
            _filter: FeedFilter,
            _sink: ChangeSink,
        ) -> LocalBoxFuture<'static, std::result::Result<FeedQuery, FeedError>> {
            let live = Rc::clone(&self.live);
            live.set(live.get() + 1);
            future::ready(Ok(FeedQuery::new(3, move || live.set(live.get() - 1)))).boxed_local()
        }
    }

    #[test]
    fn unmount_releases_tracker_and_feed_once() {
        let mut pool = LocalPool::new();
        let host = Rc::new(StillHost::default());
        let backend = Rc::new(CountingBackend::default());
        let feed = UnreadFeed::new(backend.clone(), Rc::new(pool.spawner()));
        let identity = Observable::new(Identity::new("u1"));

        let mut view = MountedView::mount(
            &SyncConfig::default(),
            host.clone(),
            Rc::new(identity),
            &feed,
        );
        pool.run_until_stalled();
        assert_eq!(view.tracker().current().path(), "/inbox");
        assert_eq!(view.counts().state(), LifecycleState::Live);
        assert_eq!(host.bus.listener_count(), 1);
        assert_eq!(backend.live.get(), 1);

        view.unmount();
        view.unmount();
        assert!(!view.is_mounted());
        assert!(view.tracker().is_released());
        assert!(view.counts().is_cancelled());
        assert_eq!(host.bus.listener_count(), 0);
        assert_eq!(backend.live.get(), 0);
        assert_eq!(view.counts().stats().cancels, 1);
    }
}
