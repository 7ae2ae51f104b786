#[cfg(test)]
pub(crate) mod fake;
mod kube_cluster;

pub use self::kube_cluster::KubeCluster;

use futures::stream::BoxStream;
use k8s_openapi::api::batch::v1::Job;
use thiserror::Error;

use crate::kubernetes_objects::JobRef;

/// A change notification for a watched Job.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// The Job was added or modified; carries its current state.
    Applied(Job),
    Deleted(Job),
}

pub type JobEventStream = BoxStream<'static, Result<JobEvent, ClusterError>>;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Kubernetes client error: {0}")]
    KubeClient(#[from] kube::Error),

    #[error("Watch stream error: {0}")]
    Watch(#[from] kube::runtime::watcher::Error),

    #[error("Job '{0}' was not found")]
    NotFound(JobRef),
}

/// Cluster operations the job runner depends on.
#[allow(async_fn_in_trait)]
pub trait ClusterClient {
    /// Creates `job` in `namespace` and returns the stored object.
    async fn create(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError>;

    async fn get(&self, job: &JobRef) -> Result<Job, ClusterError>;

    /// Fails with [`ClusterError::NotFound`] when the Job does not exist.
    async fn delete(&self, job: &JobRef) -> Result<(), ClusterError>;

    /// Opens a subscription delivering changes of exactly this Job.
    ///
    /// Dropping the returned stream ends the subscription.
    async fn watch(&self, job: &JobRef) -> Result<JobEventStream, ClusterError>;
}
