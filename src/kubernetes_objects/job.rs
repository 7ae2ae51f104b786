use std::fmt::Display;

use k8s_openapi::api::batch::v1::{Job, JobCondition, JobStatus};
use thiserror::Error;

use crate::identity::new_id;

/// Identity of a Job: its namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobRef {
    pub namespace: String,
    pub name: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JobManifestError {
    #[error("Job manifest has neither 'metadata.name' nor 'metadata.generateName'")]
    MissingName,

    #[error("Job manifest '{0}' has no namespace")]
    MissingNamespace(String),

    #[error("Failed to parse Job manifest: {0}")]
    Parse(String),
}

impl JobRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        JobRef {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_job(job: &Job) -> Result<Self, JobManifestError> {
        let name = job
            .metadata
            .name
            .clone()
            .ok_or(JobManifestError::MissingName)?;
        let namespace = job
            .metadata
            .namespace
            .clone()
            .ok_or_else(|| JobManifestError::MissingNamespace(name.clone()))?;
        Ok(JobRef { namespace, name })
    }

    /// Field selector matching exactly this Job within its namespace.
    pub fn field_selector(&self) -> String {
        format!("metadata.name={}", self.name)
    }
}

impl Display for JobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Parses a YAML Job manifest.
pub fn parse_manifest(yaml: &str) -> Result<Job, JobManifestError> {
    serde_yaml::from_str(yaml).map_err(|e| JobManifestError::Parse(e.to_string()))
}

/// Fills in the namespace and, when only `generateName` is set, a concrete name.
///
/// The name is resolved locally so the Job's identity is known before it is
/// submitted.
pub fn prepare_manifest(mut job: Job, default_namespace: &str) -> Result<Job, JobManifestError> {
    if job.metadata.namespace.is_none() {
        job.metadata.namespace = Some(default_namespace.to_string());
    }
    if job.metadata.name.is_none() {
        let prefix = job
            .metadata
            .generate_name
            .take()
            .ok_or(JobManifestError::MissingName)?;
        let id = new_id();
        job.metadata.name = Some(format!("{prefix}{}", &id[..8]));
    }
    Ok(job)
}

/// Where a Job stands according to its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Running,
    Succeeded,
    Failed,
}

impl JobOutcome {
    pub fn of(status: Option<&JobStatus>) -> Self {
        let Some(status) = status else {
            return JobOutcome::Running;
        };
        if status.succeeded.unwrap_or(0) >= 1 || has_true_condition(status, "Complete") {
            JobOutcome::Succeeded
        } else if status.failed.unwrap_or(0) >= 1 || has_true_condition(status, "Failed") {
            JobOutcome::Failed
        } else {
            JobOutcome::Running
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobOutcome::Running)
    }
}

fn find_condition<'a>(status: &'a JobStatus, type_: &str) -> Option<&'a JobCondition> {
    status
        .conditions
        .as_ref()?
        .iter()
        .find(|c| c.type_ == type_ && c.status == "True")
}

fn has_true_condition(status: &JobStatus, type_: &str) -> bool {
    find_condition(status, type_).is_some()
}

/// Condensed view of a Job status for error reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatusSummary {
    pub active: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub failure_reason: Option<String>,
    pub failure_message: Option<String>,
}

impl From<Option<&JobStatus>> for JobStatusSummary {
    fn from(status: Option<&JobStatus>) -> Self {
        let Some(status) = status else {
            return JobStatusSummary::default();
        };
        let failed_condition = find_condition(status, "Failed");
        JobStatusSummary {
            active: status.active.unwrap_or(0),
            succeeded: status.succeeded.unwrap_or(0),
            failed: status.failed.unwrap_or(0),
            failure_reason: failed_condition.and_then(|c| c.reason.clone()),
            failure_message: failed_condition.and_then(|c| c.message.clone()),
        }
    }
}

impl Display for JobStatusSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "active: {}, succeeded: {}, failed: {}",
            self.active, self.succeeded, self.failed
        )?;
        if let Some(reason) = &self.failure_reason {
            write!(f, ", reason: {reason}")?;
        }
        if let Some(message) = &self.failure_message {
            write!(f, " ({message})")?;
        }
        Ok(())
    }
}
