mod raw;

pub use self::raw::ConfigParseError;

use self::raw::RawConfig;
use kube::api::DeleteParams;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Config {
    pub namespace: String,
    pub timeout: Option<Duration>,
    pub cleanup_grace: Duration,
    pub propagation_policy: DeletePropagation,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            timeout: None,
            cleanup_grace: Duration::from_secs(30),
            propagation_policy: DeletePropagation::Background,
        }
    }
}

/// How the Job's Pods are treated when the Job is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DeletePropagation {
    Background,
    Foreground,
    Orphan,
}

impl DeletePropagation {
    pub fn delete_params(self) -> DeleteParams {
        match self {
            DeletePropagation::Background => DeleteParams::background(),
            DeletePropagation::Foreground => DeleteParams::foreground(),
            DeletePropagation::Orphan => DeleteParams::orphan(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Invalid config file '{path}': {source}")]
    Invalid {
        path: String,
        source: ConfigParseError,
    },
}

impl Config {
    pub async fn new_from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let display = path.display().to_string();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigLoadError::Io {
                path: display.clone(),
                source,
            })?;
        Self::parse(&content, display)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        Self::parse(yaml, "<inline>".to_string())
    }

    fn parse(yaml: &str, path: String) -> Result<Self, ConfigLoadError> {
        let raw: RawConfig = if yaml.trim().is_empty() {
            RawConfig::default()
        } else {
            match serde_yaml::from_str(yaml) {
                Ok(raw) => raw,
                Err(source) => return Err(ConfigLoadError::Yaml { path, source }),
            }
        };
        Config::try_from(raw).map_err(|source| ConfigLoadError::Invalid { path, source })
    }
}
