use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;
use tracing_error::{ExtractSpanTrace, SpanTrace};

use crate::cluster::ClusterError;
use crate::context::CancelReason;
use crate::error::SpannedErr;
use crate::kubernetes_objects::{JobManifestError, JobRef, JobStatusSummary};

/// Step of a run in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Submit,
    Watch,
    Verify,
    Cleanup,
}

impl Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Submit => "submit",
            RunPhase::Watch => "watch",
            RunPhase::Verify => "verify",
            RunPhase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Classified failure of a job run.
///
/// Only [`JobRunError::Cleanup`] means the Job itself succeeded. A failed run
/// may leave the Job on the cluster when deleting it failed too; that failure
/// is logged, while the error returned is the one that stopped the run.
#[derive(Error, Debug)]
pub enum JobRunError {
    #[error("Unexpected failure while submitting job: {0}")]
    Submission(SpannedErr<SubmitJobError>),

    #[error("Unexpected failure while watching job '{0}': {1}")]
    Watch(JobRef, SpannedErr<WatchJobError>),

    #[error("Run of job '{job}' was cancelled during {phase}: {reason}")]
    Cancellation {
        job: JobRef,
        phase: RunPhase,
        reason: SpannedErr<CancelReason>,
    },

    #[error("Unexpected failure while verifying job '{0}': {1}")]
    Verification(JobRef, SpannedErr<VerifyJobError>),

    #[error("Failed to clean up job '{0}': {1}")]
    Cleanup(JobRef, SpannedErr<CleanupJobError>),
}

#[derive(Error, Debug)]
pub enum SubmitJobError {
    #[error("Invalid Job manifest: {0}")]
    InvalidManifest(#[from] JobManifestError),

    #[error("Cluster rejected job '{0}': {1}")]
    Rejected(JobRef, ClusterError),
}

#[derive(Error, Debug)]
pub enum WatchJobError {
    #[error("Failed to open watch subscription: {0}")]
    Open(ClusterError),

    #[error("Watch subscription failed: {0}")]
    Stream(ClusterError),

    #[error("Job was deleted before reaching a terminal state")]
    JobDeleted,

    #[error("Watch subscription ended before the job reached a terminal state")]
    StreamClosed,

    #[error("Watch listener stopped without reporting a result")]
    ListenerStopped,
}

#[derive(Error, Debug)]
pub enum VerifyJobError {
    #[error("Failed to fetch job status: {0}")]
    Fetch(ClusterError),

    #[error("Job did not complete successfully ({0})")]
    NotSucceeded(JobStatusSummary),
}

#[derive(Error, Debug)]
pub enum CleanupJobError {
    #[error("Failed to delete job: {0}")]
    Delete(ClusterError),

    #[error("Deleting the job did not finish within {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl CleanupJobError {
    /// Whether the Job was already gone when it was deleted.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CleanupJobError::Delete(ClusterError::NotFound(_)))
    }
}

impl JobRunError {
    pub(crate) fn cancelled(job: &JobRef, phase: RunPhase, reason: CancelReason) -> Self {
        JobRunError::Cancellation {
            job: job.clone(),
            phase,
            reason: SpannedErr::new(reason),
        }
    }

    pub fn phase(&self) -> RunPhase {
        match self {
            JobRunError::Submission(_) => RunPhase::Submit,
            JobRunError::Watch(..) => RunPhase::Watch,
            JobRunError::Cancellation { phase, .. } => *phase,
            JobRunError::Verification(..) => RunPhase::Verify,
            JobRunError::Cleanup(..) => RunPhase::Cleanup,
        }
    }

    /// Whether the Job ran to success even though the run failed.
    pub fn job_succeeded(&self) -> bool {
        matches!(self, JobRunError::Cleanup(..))
    }

    pub fn job(&self) -> Option<&JobRef> {
        match self {
            JobRunError::Submission(e) => match e.inner() {
                SubmitJobError::Rejected(job, _) => Some(job),
                SubmitJobError::InvalidManifest(_) => None,
            },
            JobRunError::Watch(job, _)
            | JobRunError::Cancellation { job, .. }
            | JobRunError::Verification(job, _)
            | JobRunError::Cleanup(job, _) => Some(job),
        }
    }
}

impl ExtractSpanTrace for JobRunError {
    fn span_trace(&self) -> Option<&SpanTrace> {
        match self {
            JobRunError::Submission(e) => e.span_trace(),
            JobRunError::Watch(_, e) => e.span_trace(),
            JobRunError::Cancellation { reason, .. } => reason.span_trace(),
            JobRunError::Verification(_, e) => e.span_trace(),
            JobRunError::Cleanup(_, e) => e.span_trace(),
        }
    }
}
