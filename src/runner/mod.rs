mod cleanup;
pub mod error;
mod submit;
mod verify;
mod watch;

use std::time::Duration;

use k8s_openapi::api::batch::v1::Job;
use tracing::field::{Empty, debug};
use tracing::{Span, info, instrument, warn};

use self::error::{JobRunError, SubmitJobError};
use crate::cluster::ClusterClient;
use crate::context::RunContext;
use crate::error::{SpannedExt, report_error};
use crate::kubernetes_objects::JobRef;

const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_secs(30);

/// Lifecycle state of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Submitted,
    Watching,
    Verified { succeeded: bool },
    Cleaned,
    Done,
    Aborted,
}

struct RunTracker {
    state: RunState,
}

impl RunTracker {
    fn new() -> Self {
        let tracker = RunTracker {
            state: RunState::Created,
        };
        Span::current().record("state", debug(&tracker.state));
        tracker
    }

    fn enter(&mut self, next: RunState) {
        tracing::debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
        Span::current().record("state", debug(&next));
    }
}

/// Submits a Job, waits for its outcome, verifies it and deletes it again.
pub struct JobRunner<C> {
    cluster: C,
    cleanup_grace: Duration,
}

impl<C: ClusterClient> JobRunner<C> {
    pub fn new(cluster: C) -> Self {
        JobRunner {
            cluster,
            cleanup_grace: DEFAULT_CLEANUP_GRACE,
        }
    }

    /// Time allowed for deleting the Job, independent of the run's context.
    pub fn with_cleanup_grace(mut self, grace: Duration) -> Self {
        self.cleanup_grace = grace;
        self
    }

    /// Runs `job` to completion.
    ///
    /// Returns `Ok(())` only if the Job succeeded and was deleted afterwards.
    /// Once the Job may have been created, deletion is attempted on every path
    /// under a fresh context bounded by the cleanup grace period.
    #[instrument(
        "job_runner/run",
        skip_all,
        fields(kubernetes_namespace = Empty, job_name = Empty, state = Empty)
    )]
    pub async fn run(&self, ctx: &RunContext, job: Job) -> Result<(), JobRunError> {
        let mut tracker = RunTracker::new();

        let job_ref = match JobRef::from_job(&job) {
            Ok(job_ref) => job_ref,
            Err(e) => {
                tracker.enter(RunState::Aborted);
                return Err(SubmitJobError::from(e))
                    .with_span_trace()
                    .map_err(JobRunError::Submission);
            }
        };
        Span::current().record("kubernetes_namespace", job_ref.namespace.as_str());
        Span::current().record("job_name", job_ref.name.as_str());

        if let Err(e) = self.submit(ctx, &job_ref, &job).await {
            tracker.enter(RunState::Aborted);
            if matches!(e, JobRunError::Cancellation { .. }) {
                self.cleanup_unconfirmed(&job_ref).await;
            }
            return Err(e);
        }
        tracker.enter(RunState::Submitted);

        tracker.enter(RunState::Watching);
        let result = match self.watch(ctx, &job_ref).await {
            Ok(_) => {
                let verified = self.verify(ctx, &job_ref).await;
                match &verified {
                    Ok(_) => tracker.enter(RunState::Verified { succeeded: true }),
                    Err(JobRunError::Verification(..)) => {
                        tracker.enter(RunState::Verified { succeeded: false })
                    }
                    Err(_) => tracker.enter(RunState::Aborted),
                }
                verified.map(|_| ())
            }
            Err(e) => {
                tracker.enter(RunState::Aborted);
                Err(e)
            }
        };

        if let Some(reason) = ctx.err() {
            warn!(
                "Run of job '{job_ref}' stopped ({reason}). Deleting it within {} seconds...",
                self.cleanup_grace.as_secs()
            );
        }
        let cleaned = self.cleanup(&job_ref).await;
        if cleaned.is_ok() {
            tracker.enter(RunState::Cleaned);
        }

        let result = self.finalizer(&job_ref, result, cleaned);
        if result.is_ok() {
            tracker.enter(RunState::Done);
        }
        result
    }

    /// Merges the run result with the cleanup result; the run result wins.
    fn finalizer(
        &self,
        job_ref: &JobRef,
        result: Result<(), JobRunError>,
        cleaned: Result<(), JobRunError>,
    ) -> Result<(), JobRunError> {
        match (result, cleaned) {
            (Ok(()), Ok(())) => {
                info!("Job '{job_ref}' succeeded and was removed.");
                Ok(())
            }
            (Ok(()), Err(e)) => {
                warn!("Job '{job_ref}' succeeded but may remain on the cluster.");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                report_error(
                    &format!("Job '{job_ref}' may remain on the cluster"),
                    &cleanup,
                );
                Err(e)
            }
        }
    }
}
