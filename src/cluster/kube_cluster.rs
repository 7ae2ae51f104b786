use derive_debug::Dbg;
use futures::{StreamExt, future};
use k8s_openapi::api::batch::v1::Job;
use kube::api::{DeleteParams, PostParams};
use kube::runtime::watcher;
use kube::{Api, Client};
use tracing::{Instrument, Level, debug, trace_span};

use super::{ClusterClient, ClusterError, JobEvent, JobEventStream};
use crate::config::Config;
use crate::identity::default_source;
use crate::kubernetes_objects::JobRef;

/// [`ClusterClient`] backed by the Kubernetes API.
#[derive(Dbg, Clone)]
pub struct KubeCluster {
    #[dbg(skip)]
    client: Client,
    field_manager: String,
    delete_params: DeleteParams,
}

impl KubeCluster {
    pub fn new(client: Client, config: &Config) -> Self {
        KubeCluster {
            client,
            field_manager: default_source(),
            delete_params: config.propagation_policy.delete_params(),
        }
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl ClusterClient for KubeCluster {
    async fn create(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError> {
        let post_params = PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        self.jobs(namespace)
            .create(&post_params, job)
            .instrument(trace_span!("create_job", kubernetes_namespace = %namespace))
            .await
            .map_err(ClusterError::from)
    }

    async fn get(&self, job: &JobRef) -> Result<Job, ClusterError> {
        self.jobs(&job.namespace)
            .get_opt(&job.name)
            .instrument(trace_span!(
                "get_job",
                kubernetes_namespace = %job.namespace,
                job_name = %job.name
            ))
            .await?
            .ok_or_else(|| ClusterError::NotFound(job.clone()))
    }

    async fn delete(&self, job: &JobRef) -> Result<(), ClusterError> {
        let res = self
            .jobs(&job.namespace)
            .delete(&job.name, &self.delete_params)
            .instrument(trace_span!(
                "delete_job",
                kubernetes_namespace = %job.namespace,
                job_name = %job.name
            ))
            .await;
        match res {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(ClusterError::NotFound(job.clone())),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(
        "kube_cluster/watch",
        level = Level::TRACE,
        skip(self),
        fields(kubernetes_namespace = %job.namespace, job_name = %job.name)
    )]
    async fn watch(&self, job: &JobRef) -> Result<JobEventStream, ClusterError> {
        let config = watcher::Config::default().fields(&job.field_selector());
        debug!("Opening watch with field selector '{}'", job.field_selector());

        let stream = watcher(self.jobs(&job.namespace), config)
            .filter_map(|event| {
                future::ready(match event {
                    Ok(watcher::Event::Apply(job) | watcher::Event::InitApply(job)) => {
                        Some(Ok(JobEvent::Applied(job)))
                    }
                    Ok(watcher::Event::Delete(job)) => Some(Ok(JobEvent::Deleted(job))),
                    Ok(watcher::Event::Init | watcher::Event::InitDone) => None,
                    Err(e) => Some(Err(ClusterError::Watch(e))),
                })
            })
            .boxed();

        Ok(stream)
    }
}
