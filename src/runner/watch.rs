use futures::StreamExt;
use tokio::select;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, instrument, trace};

use super::JobRunner;
use super::error::{JobRunError, RunPhase, WatchJobError};
use crate::cluster::{ClusterClient, JobEvent, JobEventStream};
use crate::context::RunContext;
use crate::error::{SpannedErr, SpannedExt};
use crate::kubernetes_objects::{JobOutcome, JobRef, JobStatusSummary};

type StopSignal = oneshot::Receiver<Result<JobOutcome, WatchJobError>>;

/// Background listener consuming a Job's change notifications.
///
/// The listener task is aborted when the subscription is dropped, which also
/// drops the underlying event stream.
pub(super) struct WatchSubscription {
    listener: JoinHandle<()>,
}

impl WatchSubscription {
    pub(super) fn start(events: JobEventStream, job: JobRef) -> (Self, StopSignal) {
        let (stop_tx, stop_rx) = oneshot::channel();
        let listener = tokio::spawn(listen(events, job, stop_tx).in_current_span());
        (WatchSubscription { listener }, stop_rx)
    }

    pub(super) fn stop(self) {
        drop(self);
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        self.listener.abort();
        trace!("Watch subscription stopped.");
    }
}

/// Fires `stop` once the Job is terminal or the subscription fails.
async fn listen(
    mut events: JobEventStream,
    job: JobRef,
    stop: oneshot::Sender<Result<JobOutcome, WatchJobError>>,
) {
    let result = loop {
        match events.next().await {
            Some(Ok(JobEvent::Applied(observed))) => {
                if observed.metadata.name.as_deref() != Some(job.name.as_str()) {
                    trace!(
                        "Ignoring notification for job {:?}.",
                        observed.metadata.name
                    );
                    continue;
                }
                let outcome = JobOutcome::of(observed.status.as_ref());
                let summary = JobStatusSummary::from(observed.status.as_ref());
                if outcome.is_terminal() {
                    info!("Job '{job}' reached terminal state {outcome:?} ({summary}).");
                    break Ok(outcome);
                }
                debug!("Job '{job}' is still running ({summary}).");
            }
            Some(Ok(JobEvent::Deleted(_))) => break Err(WatchJobError::JobDeleted),
            Some(Err(e)) => break Err(WatchJobError::Stream(e)),
            None => break Err(WatchJobError::StreamClosed),
        }
    };

    // The receiver is gone once the run stopped waiting.
    let _ = stop.send(result);
}

impl<C: ClusterClient> JobRunner<C> {
    /// Blocks until the Job reaches a terminal state.
    #[instrument(
        "watch",
        skip_all,
        fields(kubernetes_namespace = %job_ref.namespace, job_name = %job_ref.name)
    )]
    pub(super) async fn watch(
        &self,
        ctx: &RunContext,
        job_ref: &JobRef,
    ) -> Result<JobOutcome, JobRunError> {
        let watch_error =
            |e: SpannedErr<WatchJobError>| JobRunError::Watch(job_ref.clone(), e);

        let events = ctx
            .run(self.cluster.watch(job_ref))
            .await
            .map_err(|reason| JobRunError::cancelled(job_ref, RunPhase::Watch, reason))?
            .map_err(WatchJobError::Open)
            .with_span_trace()
            .map_err(watch_error)?;

        let (subscription, stop_signal) = WatchSubscription::start(events, job_ref.clone());
        info!("Waiting for job '{job_ref}' to reach a terminal state...");

        let result = select! {
            reason = ctx.cancelled() => {
                info!("Stopped waiting for job '{job_ref}': {reason}.");
                Err(JobRunError::cancelled(job_ref, RunPhase::Watch, reason))
            }
            signal = stop_signal => match signal {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(e)) => Err(e).with_span_trace().map_err(watch_error),
                Err(_) => Err(WatchJobError::ListenerStopped)
                    .with_span_trace()
                    .map_err(watch_error),
            },
        };

        subscription.stop();
        result
    }
}
