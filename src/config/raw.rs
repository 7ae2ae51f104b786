use duration_string::DurationString;
use serde::Deserialize;
use thiserror::Error;

use super::{Config, DeletePropagation};

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub(super) struct RawConfig {
    /// Namespace used for manifests that do not set one
    pub(super) namespace: Option<String>,

    /// Upper bound for a whole run, e.g. "10m"
    pub(super) timeout: Option<DurationString>,

    /// Time allowed for deleting the Job after the run was cancelled
    pub(super) cleanup_grace: Option<DurationString>,

    pub(super) propagation_policy: Option<DeletePropagation>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigParseError {
    #[error("namespace must not be empty")]
    EmptyNamespace,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigParseError;
    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let defaults = Config::default();

        let namespace = match raw.namespace {
            Some(namespace) if namespace.trim().is_empty() => {
                return Err(ConfigParseError::EmptyNamespace);
            }
            Some(namespace) => namespace,
            None => defaults.namespace,
        };

        let timeout = raw.timeout.map(std::time::Duration::from);
        if timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigParseError::ZeroTimeout);
        }

        Ok(Config {
            namespace,
            timeout,
            cleanup_grace: raw
                .cleanup_grace
                .map(Into::into)
                .unwrap_or(defaults.cleanup_grace),
            propagation_policy: raw
                .propagation_policy
                .unwrap_or(defaults.propagation_policy),
        })
    }
}
