#![forbid(unsafe_code)]

//! Synchronizer configuration.
//!
//! Defaults can be overridden from the environment:
//!
//! | Variable                  | Field             | Values                           |
//! |---------------------------|-------------------|----------------------------------|
//! | `NAVSYNC_ROOT_PATH`       | `root_path`       | absolute path, e.g. `/`          |
//! | `NAVSYNC_RELOAD_POLICY`   | `reload_policy`   | `home-return`, `never`, `always` |
//! | `NAVSYNC_DEDUPE_IDENTITY` | `dedupe_identity` | `1`/`true`, `0`/`false`          |
//!
//! Unparseable values are ignored with a warning and the default is kept.

use std::env;

use crate::error::{Result, SyncError};
use crate::location::ROOT_PATH;
use crate::logging::warn;
use crate::policy::ReloadPolicy;

pub const ENV_ROOT_PATH: &str = "NAVSYNC_ROOT_PATH";
pub const ENV_RELOAD_POLICY: &str = "NAVSYNC_RELOAD_POLICY";
pub const ENV_DEDUPE_IDENTITY: &str = "NAVSYNC_DEDUPE_IDENTITY";

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Path of the root view used by the home-return rule.
    /// Default: `/`.
    pub root_path: String,

    /// Reload decision for pop signals.
    /// Default: [`ReloadPolicy::HomeReturn`].
    pub reload_policy: ReloadPolicy,

    /// Keep the current feed when the same identity is observed again while
    /// subscribing or live. An idle manager always reopens.
    /// Default: true.
    pub dedupe_identity: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root_path: ROOT_PATH.to_string(),
            reload_policy: ReloadPolicy::default(),
            dedupe_identity: true,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = root_path.into();
        self
    }

    #[must_use]
    pub fn with_reload_policy(mut self, policy: ReloadPolicy) -> Self {
        self.reload_policy = policy;
        self
    }

    #[must_use]
    pub fn with_dedupe_identity(mut self, dedupe: bool) -> Self {
        self.dedupe_identity = dedupe;
        self
    }

    /// Defaults with process environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults with overrides taken from `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup(ENV_ROOT_PATH) {
            config.root_path = val;
        }
        if let Some(val) = lookup(ENV_RELOAD_POLICY) {
            match val.parse() {
                Ok(policy) => config.reload_policy = policy,
                Err(_) => warn!(variable = ENV_RELOAD_POLICY, value = %val, "ignoring override"),
            }
        }
        if let Some(val) = lookup(ENV_DEDUPE_IDENTITY) {
            match parse_flag(&val) {
                Some(flag) => config.dedupe_identity = flag,
                None => warn!(variable = ENV_DEDUPE_IDENTITY, value = %val, "ignoring override"),
            }
        }

        config
    }

    /// Reject settings the tracker cannot act on.
    pub fn validate(&self) -> Result<()> {
        if !self.root_path.starts_with('/') {
            return Err(SyncError::invalid_config("root_path", self.root_path.clone()));
        }
        Ok(())
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim() {
        "1" => Some(true),
        "0" => Some(false),
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.root_path, "/");
        assert_eq!(config.reload_policy, ReloadPolicy::HomeReturn);
        assert!(config.dedupe_identity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders_override_fields() {
        let config = SyncConfig::default()
            .with_root_path("/market")
            .with_reload_policy(ReloadPolicy::Never)
            .with_dedupe_identity(false);
        assert_eq!(config.root_path, "/market");
        assert_eq!(config.reload_policy, ReloadPolicy::Never);
        assert!(!config.dedupe_identity);
    }

    #[test]
    fn lookup_overrides_apply() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            (ENV_ROOT_PATH, "/home"),
            (ENV_RELOAD_POLICY, "always"),
            (ENV_DEDUPE_IDENTITY, "0"),
        ]));
        assert_eq!(config.root_path, "/home");
        assert_eq!(config.reload_policy, ReloadPolicy::Always);
        assert!(!config.dedupe_identity);
    }

    #[test]
    fn bad_overrides_keep_defaults() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            (ENV_RELOAD_POLICY, "sometimes"),
            (ENV_DEDUPE_IDENTITY, "maybe"),
        ]));
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn empty_lookup_is_default() {
        assert_eq!(SyncConfig::from_lookup(|_| None), SyncConfig::default());
    }

    #[test]
    fn relative_root_is_invalid() {
        let err = SyncConfig::default()
            .with_root_path("home")
            .validate()
            .unwrap_err();
        assert_eq!(err, SyncError::invalid_config("root_path", "home"));
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 1 "), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("yes"), None);
    }
}
