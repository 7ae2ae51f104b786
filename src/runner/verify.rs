use tracing::{error, info, instrument};

use super::JobRunner;
use super::error::{JobRunError, RunPhase, VerifyJobError};
use crate::cluster::ClusterClient;
use crate::context::RunContext;
use crate::error::SpannedExt;
use crate::kubernetes_objects::{JobRef, JobStatusSummary};

impl<C: ClusterClient> JobRunner<C> {
    /// Reads the Job again and accepts it only if at least one Pod succeeded.
    #[instrument(
        "verify",
        skip_all,
        fields(kubernetes_namespace = %job_ref.namespace, job_name = %job_ref.name)
    )]
    pub(super) async fn verify(
        &self,
        ctx: &RunContext,
        job_ref: &JobRef,
    ) -> Result<JobStatusSummary, JobRunError> {
        let job = ctx
            .run(self.cluster.get(job_ref))
            .await
            .map_err(|reason| JobRunError::cancelled(job_ref, RunPhase::Verify, reason))?
            .map_err(VerifyJobError::Fetch)
            .with_span_trace()
            .map_err(|e| JobRunError::Verification(job_ref.clone(), e))?;

        let summary = JobStatusSummary::from(job.status.as_ref());
        if summary.succeeded >= 1 {
            info!("Job '{job_ref}' completed successfully ({summary}).");
            Ok(summary)
        } else {
            error!("Job '{job_ref}' did not complete successfully ({summary}).");
            Err(VerifyJobError::NotSucceeded(summary))
                .with_span_trace()
                .map_err(|e| JobRunError::Verification(job_ref.clone(), e))
        }
    }
}
