#![forbid(unsafe_code)]

//! Location values, navigation signals, and tracked navigation state.
//!
//! # Invariants
//!
//! 1. [`TrackerState::current`] is always the most recently observed
//!    location.
//! 2. [`TrackerState::previous`] is `None` until the first transition and
//!    afterwards holds the location that was current immediately before the
//!    latest one.
//! 3. Advancing never skips or merges observations: every call to
//!    [`TrackerState::advance`] shifts exactly one location.

use std::fmt;

/// Path of the root view.
pub const ROOT_PATH: &str = "/";

/// A single observed location. Equality is structural on the path.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    path: String,
}

impl Location {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The root location (`/`).
    #[must_use]
    pub fn root() -> Self {
        Self::new(ROOT_PATH)
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this location is the given root path.
    #[must_use]
    pub fn is_root(&self, root: &str) -> bool {
        self.path == root
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl From<&str> for Location {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for Location {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationKind {
    /// Back/forward driven by the host.
    Pop,
    /// Programmatic navigation.
    Push,
}

impl NavigationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pop => "pop",
            Self::Push => "push",
        }
    }
}

/// A history-changed signal delivered by the host.
///
/// Both variants carry the location the host reports at delivery time.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    Pop { location: Location },
    Push { location: Location },
}

impl NavigationEvent {
    #[must_use]
    pub fn pop(location: impl Into<Location>) -> Self {
        Self::Pop {
            location: location.into(),
        }
    }

    #[must_use]
    pub fn push(location: impl Into<Location>) -> Self {
        Self::Push {
            location: location.into(),
        }
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            Self::Pop { location } | Self::Push { location } => location,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> NavigationKind {
        match self {
            Self::Pop { .. } => NavigationKind::Pop,
            Self::Push { .. } => NavigationKind::Push,
        }
    }
}

/// `(previous, current)` pair maintained for one activated view.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerState {
    previous: Option<Location>,
    current: Location,
}

impl TrackerState {
    /// State at activation: no previous location yet.
    #[must_use]
    pub fn new(initial: Location) -> Self {
        Self {
            previous: None,
            current: initial,
        }
    }

    #[must_use]
    pub fn current(&self) -> &Location {
        &self.current
    }

    #[must_use]
    pub fn previous(&self) -> Option<&Location> {
        self.previous.as_ref()
    }

    /// Record a new observation and return the location it displaced.
    pub fn advance(&mut self, next: Location) -> Location {
        let displaced = std::mem::replace(&mut self.current, next);
        self.previous = Some(displaced.clone());
        displaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_location_is_root() {
        assert!(Location::root().is_root(ROOT_PATH));
        assert!(!Location::new("/dashboard").is_root(ROOT_PATH));
        assert!(Location::new("/app").is_root("/app"));
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Location::new("/a"), Location::from("/a"));
        assert_eq!(Location::from(String::from("/a")), Location::new("/a"));
        assert_ne!(Location::new("/a"), Location::new("/a/"));
    }

    #[test]
    fn display_is_the_path() {
        assert_eq!(Location::new("/listing/42").to_string(), "/listing/42");
    }

    #[test]
    fn event_accessors() {
        let pop = NavigationEvent::pop("/");
        assert_eq!(pop.kind(), NavigationKind::Pop);
        assert_eq!(pop.location(), &Location::root());

        let push = NavigationEvent::push("/sell");
        assert_eq!(push.kind().as_str(), "push");
        assert_eq!(push.location().path(), "/sell");
    }

    #[test]
    fn fresh_state_has_no_previous() {
        let state = TrackerState::new(Location::new("/dashboard"));
        assert_eq!(state.current().path(), "/dashboard");
        assert!(state.previous().is_none());
    }

    #[test]
    fn advance_shifts_current_into_previous() {
        let mut state = TrackerState::new(Location::new("/a"));
        let displaced = state.advance(Location::new("/b"));
        assert_eq!(displaced.path(), "/a");
        assert_eq!(state.previous().map(Location::path), Some("/a"));
        assert_eq!(state.current().path(), "/b");

        state.advance(Location::new("/c"));
        assert_eq!(state.previous().map(Location::path), Some("/b"));
        assert_eq!(state.current().path(), "/c");
    }

    #[test]
    fn advance_to_same_path_still_shifts() {
        let mut state = TrackerState::new(Location::root());
        state.advance(Location::root());
        assert_eq!(state.previous(), Some(&Location::root()));
        assert_eq!(state.current(), &Location::root());
    }
}
