//! Identity, unread counts, and feed filters.

use std::fmt;

/// Authenticated subject a feed is scoped to.
///
/// Never empty: an empty string from the identity provider means "absent"
/// and is mapped to `None` by [`Identity::new`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() { None } else { Some(Self(id)) }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Size of the unread result set for the current identity.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnreadCount(usize);

impl UnreadCount {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: usize) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<usize> for UnreadCount {
    fn from(count: usize) -> Self {
        Self(count)
    }
}

impl fmt::Display for UnreadCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadState {
    Unread,
    Read,
}

/// Filter handed to the feed backend when opening a live query.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedFilter {
    pub owner: Identity,
    pub state: ReadState,
}

impl FeedFilter {
    /// `{ owner, state: unread }`.
    #[must_use]
    pub fn unread(owner: Identity) -> Self {
        Self {
            owner,
            state: ReadState::Unread,
        }
    }

    #[must_use]
    pub fn matches(&self, owner: &Identity, state: ReadState) -> bool {
        &self.owner == owner && self.state == state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identity_is_absent() {
        assert!(Identity::new("").is_none());
        assert_eq!(Identity::new("u1").map(|id| id.to_string()), Some("u1".into()));
    }

    #[test]
    fn unread_count_basics() {
        assert!(UnreadCount::ZERO.is_zero());
        assert_eq!(UnreadCount::from(3).get(), 3);
        assert_eq!(UnreadCount::new(12).to_string(), "12");
        assert!(UnreadCount::new(1) > UnreadCount::ZERO);
    }

    #[test]
    fn unread_filter_matches_owner_and_state() {
        let u1 = Identity::new("u1").expect("non-empty");
        let u2 = Identity::new("u2").expect("non-empty");
        let filter = FeedFilter::unread(u1.clone());
        assert!(filter.matches(&u1, ReadState::Unread));
        assert!(!filter.matches(&u1, ReadState::Read));
        assert!(!filter.matches(&u2, ReadState::Unread));
    }
}
