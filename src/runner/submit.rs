use k8s_openapi::api::batch::v1::Job;
use tracing::{info, instrument};

use super::JobRunner;
use super::error::{JobRunError, RunPhase, SubmitJobError};
use crate::cluster::ClusterClient;
use crate::context::RunContext;
use crate::error::SpannedExt;
use crate::kubernetes_objects::JobRef;

impl<C: ClusterClient> JobRunner<C> {
    #[instrument(
        "submit",
        skip_all,
        fields(kubernetes_namespace = %job_ref.namespace, job_name = %job_ref.name)
    )]
    pub(super) async fn submit(
        &self,
        ctx: &RunContext,
        job_ref: &JobRef,
        job: &Job,
    ) -> Result<Job, JobRunError> {
        info!("Submitting job '{job_ref}'...");

        let created = ctx
            .run(self.cluster.create(&job_ref.namespace, job))
            .await
            .map_err(|reason| JobRunError::cancelled(job_ref, RunPhase::Submit, reason))?
            .map_err(|e| SubmitJobError::Rejected(job_ref.clone(), e))
            .with_span_trace()
            .map_err(JobRunError::Submission)?;

        info!(
            "Job '{job_ref}' submitted (uid: {}).",
            created.metadata.uid.as_deref().unwrap_or("<unknown>")
        );
        Ok(created)
    }
}
