use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Failure reported by a feed backend while opening a live query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("feed backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("feed query for {owner} rejected: {reason}")]
    Rejected { owner: String, reason: String },

    #[error("feed backend closed before the query opened")]
    Closed,
}

impl FeedError {
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Whether a later attempt could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("failed to open unread feed for {owner}: {source}")]
    FeedOpen {
        owner: String,
        #[source]
        source: FeedError,
    },

    #[error("scope {scope_id} has already been released")]
    Released { scope_id: u64 },

    #[error("could not schedule feed task: {reason}")]
    Spawn { reason: String },

    #[error("invalid configuration for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    #[error("logging initialization failed: {reason}")]
    LoggingInit { reason: String },
}

impl SyncError {
    #[must_use]
    pub fn invalid_config(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The backend error behind a failed feed open, if this is one.
    #[must_use]
    pub fn feed_error(&self) -> Option<&FeedError> {
        match self {
            Self::FeedOpen { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn feed_open_display_includes_owner_and_cause() {
        let err = SyncError::FeedOpen {
            owner: "u1".into(),
            source: FeedError::unavailable("offline"),
        };
        assert_eq!(
            err.to_string(),
            "failed to open unread feed for u1: feed backend unavailable: offline"
        );
        assert!(err.source().is_some());
        assert_eq!(err.feed_error(), Some(&FeedError::unavailable("offline")));
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(FeedError::unavailable("x").is_transient());
        assert!(!FeedError::Closed.is_transient());
        assert!(
            !FeedError::Rejected {
                owner: "u1".into(),
                reason: "forbidden".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn released_has_no_feed_error() {
        assert!(SyncError::Released { scope_id: 7 }.feed_error().is_none());
    }
}
