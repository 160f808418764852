//! Runs one generation workflow: location, weather, prompt, job, polling.
//!
//! The orchestrator is the only writer of [`WorkflowState`]. Long-running
//! polling happens on a [`PollTimer`] task which reports back through an
//! event channel; the caller drives that channel with [`Orchestrator::recv_event`]
//! and [`Orchestrator::handle_event`], or simply awaits
//! [`Orchestrator::wait_until_settled`].

use std::sync::Arc;
use std::time::Duration;

use skyframe_core::AppError;
use skyframe_imagegen::{GenerationError, GenerationJob, JobService};
use skyframe_weather::{Locator, WeatherSource};
use tokio::sync::{mpsc, watch};

use crate::poller::{PollTimer, WorkflowEvent};
use crate::prompt::build_prompt;
use crate::state::{PollOrigin, PollOutcome, TimerAction, WorkflowState, NO_ACTIVE_JOB};

pub struct Orchestrator {
    locator: Arc<dyn Locator>,
    weather: Arc<dyn WeatherSource>,
    jobs: Arc<dyn JobService>,
    poll_interval: Duration,
    state: WorkflowState,
    state_tx: watch::Sender<WorkflowState>,
    timer: Option<PollTimer>,
    /// Incremented by every `generate`; events from older runs are ignored
    run: u64,
    events_tx: mpsc::UnboundedSender<WorkflowEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkflowEvent>,
}

impl Orchestrator {
    pub fn new(
        locator: Arc<dyn Locator>,
        weather: Arc<dyn WeatherSource>,
        jobs: Arc<dyn JobService>,
        poll_interval: Duration,
    ) -> Self {
        let state = WorkflowState::default();
        let (state_tx, _) = watch::channel(state.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            locator,
            weather,
            jobs,
            poll_interval,
            state,
            state_tx,
            timer: None,
            run: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Receive a snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state_tx.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start a fresh run, cancelling any previous one.
    ///
    /// Returns once the job has been submitted and the poll timer started.
    /// Failures before that point end the run and are returned; polling
    /// failures are only ever reported through the state.
    #[tracing::instrument(skip(self))]
    pub async fn generate(&mut self) -> Result<(), AppError> {
        self.stop_polling();
        self.run += 1;
        self.update(WorkflowState::reset);

        self.update(|s| s.set_status("Requesting location..."));
        let located = self.locator.current_location().await;
        let location = match located {
            Ok(location) => location,
            Err(e) => return Err(self.abort_run(e.into(), "Location error")),
        };
        self.update(|s| s.on_location(location));

        self.update(|s| s.set_status("Fetching weather data..."));
        let weather = self.weather.fetch_weather(&location).await;
        let prompt = build_prompt(&location, &weather);
        tracing::debug!("Prompt: {}", prompt);
        self.update(|s| {
            s.on_weather(weather);
            s.prompt = Some(prompt.clone());
        });

        self.update(|s| s.set_status("Sending request to start image generation..."));
        let submitted = self.jobs.submit(&prompt).await;
        let job = match submitted {
            Ok(job) => job,
            Err(e) => return Err(self.abort_run(e.into(), "Image generation error")),
        };
        self.update(|s| s.on_submitted(&job));

        self.start_polling(job.id);
        Ok(())
    }

    /// Check the active job once, right now.
    ///
    /// Works with or without a running timer and never starts one.
    pub async fn check_status(&mut self) {
        let Some(job_id) = self.state.job_id.clone() else {
            self.update(|s| s.set_error(NO_ACTIVE_JOB));
            return;
        };

        self.update(|s| s.begin_manual_check(&job_id));
        let result = self.jobs.poll(&job_id).await;
        self.apply_poll_result(PollOrigin::Manual, &job_id, result);
    }

    /// Wait for the next background event. Cancel-safe.
    pub async fn recv_event(&mut self) -> Option<WorkflowEvent> {
        self.events_rx.recv().await
    }

    pub fn handle_event(&mut self, event: WorkflowEvent) {
        match event {
            WorkflowEvent::Polled {
                run,
                job_id,
                result,
            } => {
                // Results queued before a cancel arrive after the timer is gone
                let timer_owns = self.timer.as_ref().is_some_and(|t| t.job_id() == job_id);
                if run != self.run || !timer_owns || !self.state.is_active_job(&job_id) {
                    tracing::debug!("Ignoring stale status check for {} (run {})", job_id, run);
                    return;
                }
                self.apply_poll_result(PollOrigin::Timer, &job_id, result);
            }
        }
    }

    /// Process events until the timer stops, then return the final state.
    pub async fn wait_until_settled(&mut self) -> &WorkflowState {
        while self.is_polling() {
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
        &self.state
    }

    /// Stop automatic checks. The job id is kept so a manual check still works.
    pub fn cancel(&mut self) {
        if self.timer.is_none() {
            return;
        }
        self.stop_polling();
        self.update(|s| {
            s.loading = false;
            s.set_status("Stopped checking for results.");
        });
    }

    /// Start the timer for `job_id` unless one is already running.
    pub(crate) fn start_polling(&mut self, job_id: String) -> bool {
        if let Some(timer) = self.timer.as_ref().filter(|t| !t.is_finished()) {
            tracing::warn!(
                "Poll timer already active for {}, not starting another",
                timer.job_id()
            );
            return false;
        }

        self.timer = Some(PollTimer::start(
            Arc::clone(&self.jobs),
            job_id,
            self.run,
            self.poll_interval,
            self.events_tx.clone(),
        ));
        true
    }

    fn stop_polling(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    fn apply_poll_result(
        &mut self,
        origin: PollOrigin,
        job_id: &str,
        result: Result<GenerationJob, GenerationError>,
    ) {
        let outcome = PollOutcome::from_result(&result);
        let mut action = TimerAction::Keep;
        self.update(|s| action = s.apply_poll(origin, job_id, outcome));
        if action == TimerAction::Cancel {
            self.stop_polling();
        }
    }

    fn abort_run(&mut self, err: AppError, context: &str) -> AppError {
        tracing::error!("{}: {} ({})", context, err, err.user_message());
        let message = format!("{}: {}", context, err);
        self.update(|s| s.fail_run(message));
        err
    }

    fn update(&mut self, f: impl FnOnce(&mut WorkflowState)) {
        f(&mut self.state);
        self.state_tx.send_replace(self.state.clone());
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
