//! Runtime configuration.
//!
//! The runtime has a single knob today: what to do when an observable is
//! read while no computation is being tracked. Such reads are legal (they
//! just don't create a dependency) but are often a mistake, so by default
//! they are reported at `warn` level.
//!
//! Configuration is per thread, like the rest of the runtime. Install one
//! with [`Runtime::configure`](crate::reactive::Runtime::configure).

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How to report an observable read that happens outside any tracked
/// computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UntrackedReadPolicy {
    /// Emit a `tracing` warning.
    #[default]
    Warn,
    /// Emit a `tracing` debug event.
    Debug,
    /// Say nothing.
    Silent,
}

/// Runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Diagnostic emitted for reads outside a tracked computation.
    pub untracked_reads: UntrackedReadPolicy,
}

impl Config {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Builder-style setter for [`Config::untracked_reads`].
    pub fn with_untracked_reads(mut self, policy: UntrackedReadPolicy) -> Self {
        self.untracked_reads = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReactiveError;

    #[test]
    fn default_warns() {
        assert_eq!(Config::default().untracked_reads, UntrackedReadPolicy::Warn);
    }

    #[test]
    fn parses_policy_from_json() {
        let config = Config::from_json(r#"{ "untracked_reads": "silent" }"#).unwrap();
        assert_eq!(config.untracked_reads, UntrackedReadPolicy::Silent);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = Config::from_json(r#"{ "untracked_reads": "loud" }"#).unwrap_err();
        assert!(matches!(err, ReactiveError::InvalidConfig(_)));
    }

    #[test]
    fn json_round_trip_keeps_policy() {
        let config = Config::default().with_untracked_reads(UntrackedReadPolicy::Debug);
        let json = config.to_json().unwrap();
        assert_eq!(json, r#"{"untracked_reads":"debug"}"#);
    }
}
