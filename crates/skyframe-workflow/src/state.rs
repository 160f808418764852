//! Workflow state and poll outcome transitions.
//!
//! Everything here is synchronous and owned by the orchestrator. The poll
//! timer never touches [`WorkflowState`]; its results come back as events and
//! are applied through [`WorkflowState::apply_poll`].

use skyframe_core::AppError;
use skyframe_imagegen::{GenerationError, GenerationJob, JobStatus};
use skyframe_weather::{Location, WeatherInfo};

pub const READY_STATUS: &str = "Ready.";
pub const NO_ACTIVE_JOB: &str = "No active generation task ID found.";
const UNKNOWN_REASON: &str = "Unknown";

/// What the orchestrator should do with the poll timer after an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Keep,
    Cancel,
}

/// Where a status check came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOrigin {
    Timer,
    Manual,
}

impl std::fmt::Display for PollOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollOrigin::Timer => f.write_str("timer"),
            PollOrigin::Manual => f.write_str("manual"),
        }
    }
}

/// Classification of a single status check
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed { image_url: String },
    EmptyOutput,
    Terminated { status: JobStatus, reason: String },
    Pending { status: JobStatus },
    /// A status string the client does not recognize; treated as non-terminal
    Unexpected { status: String },
    CheckFailed { message: String, permanent: bool },
}

impl PollOutcome {
    pub fn from_result(result: &Result<GenerationJob, GenerationError>) -> Self {
        let job = match result {
            Ok(job) => job,
            Err(e) => {
                return PollOutcome::CheckFailed {
                    permanent: e.is_permanent(),
                    message: e.to_string(),
                }
            }
        };

        match &job.status {
            JobStatus::Succeeded => match job.first_output() {
                Some(url) => PollOutcome::Completed {
                    image_url: url.to_string(),
                },
                None => PollOutcome::EmptyOutput,
            },
            JobStatus::Failed | JobStatus::Canceled => PollOutcome::Terminated {
                status: job.status.clone(),
                reason: job
                    .error
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_REASON.to_string()),
            },
            JobStatus::Starting | JobStatus::Processing => PollOutcome::Pending {
                status: job.status.clone(),
            },
            JobStatus::Other(status) => PollOutcome::Unexpected {
                status: status.clone(),
            },
        }
    }

    /// True if the job will not be checked again after this outcome
    pub fn is_final(&self) -> bool {
        match self {
            PollOutcome::Completed { .. }
            | PollOutcome::EmptyOutput
            | PollOutcome::Terminated { .. } => true,
            PollOutcome::CheckFailed { permanent, .. } => *permanent,
            PollOutcome::Pending { .. } | PollOutcome::Unexpected { .. } => false,
        }
    }
}

/// Observable state of the current workflow run
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub status: String,
    pub is_error: bool,
    /// A run is in progress and has not reached a final outcome
    pub loading: bool,
    pub job_id: Option<String>,
    pub image_url: Option<String>,
    /// Whether a manual status check is offered
    pub show_fetch_control: bool,
    pub location: Option<Location>,
    pub weather: Option<WeatherInfo>,
    pub prompt: Option<String>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            status: READY_STATUS.to_string(),
            is_error: false,
            loading: false,
            job_id: None,
            image_url: None,
            show_fetch_control: false,
            location: None,
            weather: None,
            prompt: None,
        }
    }
}

impl WorkflowState {
    /// Clear the previous run and mark a new one as in progress.
    pub fn reset(&mut self) {
        *self = Self {
            loading: true,
            ..Self::default()
        };
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.is_error = false;
        tracing::info!("Status: {}", self.status);
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.is_error = true;
        tracing::warn!("Error: {}", self.status);
    }

    /// End the run before any job is being polled.
    pub fn fail_run(&mut self, message: impl Into<String>) {
        self.set_error(message);
        self.finish();
    }

    pub fn on_location(&mut self, location: Location) {
        self.location = Some(location);
        self.set_status(format!("Location acquired: {}", location));
    }

    pub fn on_weather(&mut self, weather: WeatherInfo) {
        if weather.is_unknown() {
            self.set_status("Could not fetch weather data, using default values.");
        } else {
            self.set_status(format!(
                "Weather for {}: {}, {}°C",
                weather.city, weather.description, weather.temperature
            ));
        }
        self.weather = Some(weather);
    }

    pub fn on_submitted(&mut self, job: &GenerationJob) {
        self.job_id = Some(job.id.clone());
        self.show_fetch_control = true;
        self.set_status(format!(
            "Image generation started (ID: {}). Status: {}. Checking periodically...",
            job.id, job.status
        ));
    }

    pub fn begin_manual_check(&mut self, job_id: &str) {
        self.set_status(format!(
            "Manually checking status for prediction ID: {}...",
            job_id
        ));
    }

    /// True if `job_id` is the job this run is waiting on
    pub fn is_active_job(&self, job_id: &str) -> bool {
        self.job_id.as_deref() == Some(job_id)
    }

    /// Apply a status check result for `job_id` and decide the timer's fate.
    pub fn apply_poll(
        &mut self,
        origin: PollOrigin,
        job_id: &str,
        outcome: PollOutcome,
    ) -> TimerAction {
        tracing::debug!("Applying {} status check for {}: {:?}", origin, job_id, outcome);

        let action = if outcome.is_final() {
            TimerAction::Cancel
        } else {
            TimerAction::Keep
        };

        match outcome {
            PollOutcome::Completed { image_url } => {
                self.image_url = Some(image_url);
                self.set_status("Image generation successful!");
                self.finish();
            }
            PollOutcome::EmptyOutput => {
                self.set_error("Prediction succeeded but no output URL was found.");
                self.finish();
            }
            PollOutcome::Terminated { status, reason } => {
                let err = AppError::TerminalJobFailure(format!(
                    "Image generation {}. Reason: {}",
                    status, reason
                ));
                self.set_error(err.to_string());
                self.finish();
            }
            PollOutcome::Pending { status } => {
                self.show_fetch_control = true;
                self.set_status(format!("Current status [{}]: {}", job_id, status));
            }
            PollOutcome::Unexpected { status } => {
                tracing::warn!("Unexpected job status for {}: {}", job_id, status);
                self.show_fetch_control = true;
                self.set_status(format!("Current status [{}]: {}", job_id, status));
            }
            PollOutcome::CheckFailed {
                message,
                permanent: true,
            } => {
                self.set_error(format!(
                    "Failed to fetch status: {}. Stopping checks.",
                    message.trim_end_matches('.')
                ));
                self.finish();
            }
            PollOutcome::CheckFailed {
                message,
                permanent: false,
            } => {
                self.show_fetch_control = true;
                self.set_error(format!("Failed to fetch status: {}", message));
            }
        }

        action
    }

    fn finish(&mut self) {
        self.job_id = None;
        self.show_fetch_control = false;
        self.loading = false;
    }
}
