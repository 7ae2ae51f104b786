use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{StreamExt, stream};
use k8s_openapi::api::batch::v1::{Job, JobStatus};

use super::{ClusterClient, ClusterError, JobEvent, JobEventStream};
use crate::kubernetes_objects::JobRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Create(JobRef),
    Get(JobRef),
    Delete(JobRef),
    Watch(JobRef),
}

/// One step replayed by the fake watch subscription.
#[derive(Debug, Clone)]
pub(crate) enum WatchStep {
    /// The Job's status changes to this value and a notification is delivered.
    Status(JobStatus),
    Pause(Duration),
    Deleted,
    Error(&'static str),
}

#[derive(Default)]
struct FakeState {
    jobs: BTreeMap<JobRef, Job>,
    calls: Vec<Call>,
    create_error: Option<ClusterError>,
    delete_error: Option<ClusterError>,
    watch_error: Option<ClusterError>,
    script: Vec<WatchStep>,
    hang_after_script: bool,
    create_delay: Option<Duration>,
    delete_delay: Option<Duration>,
}

/// In-memory [`ClusterClient`] recording every call.
#[derive(Clone, Default)]
pub(crate) struct FakeCluster {
    state: Arc<Mutex<FakeState>>,
    watch_dropped: Arc<AtomicBool>,
}

pub(crate) fn api_error(message: &str) -> ClusterError {
    ClusterError::KubeClient(kube::Error::Service(message.to_string().into()))
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_watch_script(self, steps: Vec<WatchStep>) -> Self {
        self.state.lock().unwrap().script = steps;
        self
    }

    /// Keeps the subscription open once the script is exhausted.
    pub(crate) fn hang_after_script(self) -> Self {
        self.state.lock().unwrap().hang_after_script = true;
        self
    }

    /// Stores the Job and then holds the create call open for `delay`.
    pub(crate) fn slow_create(self, delay: Duration) -> Self {
        self.state.lock().unwrap().create_delay = Some(delay);
        self
    }

    /// Holds the delete call open for `delay` before removing the Job.
    pub(crate) fn slow_delete(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delete_delay = Some(delay);
        self
    }

    pub(crate) fn fail_create(self, err: ClusterError) -> Self {
        self.state.lock().unwrap().create_error = Some(err);
        self
    }

    pub(crate) fn fail_delete(self, err: ClusterError) -> Self {
        self.state.lock().unwrap().delete_error = Some(err);
        self
    }

    pub(crate) fn fail_watch(self, err: ClusterError) -> Self {
        self.state.lock().unwrap().watch_error = Some(err);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn contains(&self, job: &JobRef) -> bool {
        self.state.lock().unwrap().jobs.contains_key(job)
    }

    pub(crate) fn watch_dropped(&self) -> bool {
        self.watch_dropped.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn set_status(state: &Mutex<FakeState>, job_ref: &JobRef, status: JobStatus) -> Job {
    let mut state = state.lock().unwrap();
    let job = state.jobs.entry(job_ref.clone()).or_default();
    job.status = Some(status);
    job.clone()
}

impl ClusterClient for FakeCluster {
    async fn create(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError> {
        let job_ref = JobRef::new(namespace, job.metadata.name.clone().unwrap_or_default());
        self.record(Call::Create(job_ref.clone()));

        let (created, delay) = {
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.create_error.take() {
                return Err(err);
            }
            if state.jobs.contains_key(&job_ref) {
                return Err(api_error("jobs.batch already exists"));
            }
            let mut created = job.clone();
            created.metadata.namespace = Some(namespace.to_string());
            created.metadata.uid = Some(format!("uid-{}", job_ref.name));
            state.jobs.insert(job_ref, created.clone());
            (created, state.create_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(created)
    }

    async fn get(&self, job: &JobRef) -> Result<Job, ClusterError> {
        self.record(Call::Get(job.clone()));
        self.state
            .lock()
            .unwrap()
            .jobs
            .get(job)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(job.clone()))
    }

    async fn delete(&self, job: &JobRef) -> Result<(), ClusterError> {
        self.record(Call::Delete(job.clone()));
        let delay = self.state.lock().unwrap().delete_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.delete_error.take() {
            return Err(err);
        }
        state
            .jobs
            .remove(job)
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound(job.clone()))
    }

    async fn watch(&self, job: &JobRef) -> Result<JobEventStream, ClusterError> {
        self.record(Call::Watch(job.clone()));
        let (steps, hang) = {
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.watch_error.take() {
                return Err(err);
            }
            let steps: VecDeque<WatchStep> = std::mem::take(&mut state.script).into();
            (steps, state.hang_after_script)
        };

        let shared = self.state.clone();
        let job_ref = job.clone();
        let scripted = stream::unfold(steps, move |mut steps| {
            let shared = shared.clone();
            let job_ref = job_ref.clone();
            async move {
                loop {
                    match steps.pop_front()? {
                        WatchStep::Pause(duration) => tokio::time::sleep(duration).await,
                        WatchStep::Status(status) => {
                            let job = set_status(&shared, &job_ref, status);
                            return Some((Ok(JobEvent::Applied(job)), steps));
                        }
                        WatchStep::Deleted => {
                            let job = shared
                                .lock()
                                .unwrap()
                                .jobs
                                .remove(&job_ref)
                                .unwrap_or_default();
                            return Some((Ok(JobEvent::Deleted(job)), steps));
                        }
                        WatchStep::Error(message) => {
                            return Some((Err(api_error(message)), steps));
                        }
                    }
                }
            }
        });

        let events = if hang {
            scripted.chain(stream::pending()).boxed()
        } else {
            scripted.boxed()
        };

        let flag = DropFlag(self.watch_dropped.clone());
        Ok(events
            .map(move |event| {
                let _subscription = &flag;
                event
            })
            .boxed())
    }
}
