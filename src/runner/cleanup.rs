use tracing::{info, instrument, warn};

use super::JobRunner;
use super::error::{CleanupJobError, JobRunError};
use crate::cluster::ClusterClient;
use crate::context::RunContext;
use crate::error::{SpannedExt, report_error};
use crate::kubernetes_objects::JobRef;

impl<C: ClusterClient> JobRunner<C> {
    /// Deletes the Job within the cleanup grace period.
    ///
    /// Runs under its own context so that an expired or cancelled run context
    /// never turns a failed deletion into a cancellation.
    #[instrument(
        "cleanup",
        skip_all,
        fields(kubernetes_namespace = %job_ref.namespace, job_name = %job_ref.name)
    )]
    pub(super) async fn cleanup(&self, job_ref: &JobRef) -> Result<(), JobRunError> {
        info!("Deleting job '{job_ref}'...");
        let ctx = RunContext::detached(self.cleanup_grace);
        ctx.run(self.cluster.delete(job_ref))
            .await
            .map_err(|_| CleanupJobError::TimedOut(self.cleanup_grace))
            .and_then(|res| res.map_err(CleanupJobError::Delete))
            .with_span_trace()
            .map_err(|e| JobRunError::Cleanup(job_ref.clone(), e))?;
        info!("Job '{job_ref}' deleted.");
        Ok(())
    }

    /// Deletes a Job whose creation was interrupted.
    ///
    /// The create request may or may not have reached the API server, so a
    /// missing Job counts as removed.
    pub(super) async fn cleanup_unconfirmed(&self, job_ref: &JobRef) {
        warn!("Submission of job '{job_ref}' was interrupted. Deleting it in case it was created...");
        match self.cleanup(job_ref).await {
            Ok(()) => {}
            Err(JobRunError::Cleanup(_, e)) if e.inner().is_not_found() => {
                info!("Job '{job_ref}' was never created.");
            }
            Err(e) => report_error(&format!("Job '{job_ref}' may remain on the cluster"), &e),
        }
    }
}
