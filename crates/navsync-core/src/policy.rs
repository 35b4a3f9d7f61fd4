#![forbid(unsafe_code)]

//! Reload decision for back/forward navigation.
//!
//! A pop signal is classified into one of three [`Transition`]s:
//!
//! | before      | after       | `HomeReturn` | `Never` | `Always` |
//! |-------------|-------------|--------------|---------|----------|
//! | `x`         | `x`         | Unchanged    | Unchanged | Unchanged |
//! | non-root    | root        | Reload       | Soft    | Reload   |
//! | any         | other path  | Soft         | Soft    | Reload   |
//!
//! `HomeReturn` is the default. Soft returns to the root view were observed
//! to keep stale view state alive, so a full reload is forced there. The rule
//! is kept configurable because it is a workaround rather than settled UX.

use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;
use crate::location::Location;

/// How a pop transition should be applied by the host.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Discard all client-held state and reinitialize the view.
    Reload,
    /// Update the view in place.
    Soft,
    /// Same path as before; nothing to apply.
    Unchanged,
}

impl Transition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::Soft => "soft",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReloadPolicy {
    /// Reload when leaving a non-root location for the root.
    #[default]
    HomeReturn,
    /// Never reload; every change is soft.
    Never,
    /// Reload on every change of path.
    Always,
}

impl ReloadPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HomeReturn => "home-return",
            Self::Never => "never",
            Self::Always => "always",
        }
    }

    /// Classify a pop from `before` to `after`.
    #[must_use]
    pub fn decide(self, root: &str, before: &Location, after: &Location) -> Transition {
        if before == after {
            return Transition::Unchanged;
        }
        match self {
            Self::HomeReturn if !before.is_root(root) && after.is_root(root) => Transition::Reload,
            Self::HomeReturn | Self::Never => Transition::Soft,
            Self::Always => Transition::Reload,
        }
    }
}

impl fmt::Display for ReloadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReloadPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home-return" | "home_return" | "homereturn" => Ok(Self::HomeReturn),
            "never" | "off" => Ok(Self::Never),
            "always" => Ok(Self::Always),
            other => Err(SyncError::invalid_config("reload_policy", other)),
        }
    }
}
