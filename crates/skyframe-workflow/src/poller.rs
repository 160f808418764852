//! Cancellable repeating status check for one generation job.
//!
//! The timer owns nothing but a job id and a handle to the job service. Each
//! tick performs one remote check and reports the raw result over a channel;
//! deciding what the result means is left to the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use skyframe_imagegen::{GenerationError, GenerationJob, JobService};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest period a timer will run with
const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Messages sent from background tasks back to the orchestrator
#[derive(Debug)]
pub enum WorkflowEvent {
    /// One automatic status check finished
    Polled {
        run: u64,
        job_id: String,
        result: Result<GenerationJob, GenerationError>,
    },
}

/// Handle to a running poll timer.
///
/// Stops when cancelled, when dropped, or when the event receiver is gone.
#[derive(Debug)]
pub struct PollTimer {
    job_id: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollTimer {
    /// Start checking `job_id` every `period`, first check one period from now.
    pub fn start(
        jobs: Arc<dyn JobService>,
        job_id: String,
        run: u64,
        period: Duration,
        events: UnboundedSender<WorkflowEvent>,
    ) -> Self {
        let period = period.max(MIN_PERIOD);
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task_job_id = job_id.clone();

        tracing::info!("Polling {} every {:?}", job_id, period);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tracing::debug!("Checking status of {}", task_job_id);

                let result = tokio::select! {
                    _ = task_token.cancelled() => break,
                    result = jobs.poll(&task_job_id) => result,
                };

                let event = WorkflowEvent::Polled {
                    run,
                    job_id: task_job_id.clone(),
                    result,
                };
                if events.send(event).is_err() {
                    tracing::debug!("Event receiver closed, stopping poll timer");
                    break;
                }
            }

            tracing::debug!("Poll timer for {} stopped", task_job_id);
        });

        Self {
            job_id,
            token,
            handle,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// True once the background task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the timer. An in-flight check is abandoned and never reported.
    pub fn cancel(self) {
        tracing::info!("Stopping status checks for {}", self.job_id);
        // Drop does the work
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
