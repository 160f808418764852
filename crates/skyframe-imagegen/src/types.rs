use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use skyframe_core::{AppError, NetworkError, ReqwestErrorExt};

use crate::retry::{is_retryable_status, RetryDecision};

pub const NEGATIVE_PROMPT: &str = "ugly, blurry, poor quality, distorted, oversaturated, \
overexposed, painting, drawing, sketch, anime, cartoon, grainy, illegible text, blurry text, \
messy text, poorly rendered text, misspelled text, fuzzy text";
pub const OUTPUT_WIDTH: u32 = 1024;
pub const OUTPUT_HEIGHT: u32 = 1024;
pub const INFERENCE_STEPS: u32 = 35;
pub const GUIDANCE_SCALE: f64 = 9.0;
pub const SCHEDULER: &str = "dpmpp_2m";
pub const NUM_OUTPUTS: u32 = 1;

/// Remote job lifecycle. `Starting` and `Processing` are equivalent for polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    /// A status string this client does not know
    Other(String),
}

impl JobStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "starting" => Self::Starting,
            "processing" => Self::Processing,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generation job as last reported by the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: String,
    pub status: JobStatus,
    /// Image URLs, in the order the service returned them
    #[serde(default)]
    pub output: Vec<String>,
    pub error: Option<String>,
}

impl GenerationJob {
    pub fn first_output(&self) -> Option<&str> {
        self.output.first().map(String::as_str)
    }
}

/// Fixed model input sent with every prompt
#[derive(Debug, Clone, Serialize)]
pub struct GenerationParams<'a> {
    pub prompt: &'a str,
    pub negative_prompt: &'static str,
    pub width: u32,
    pub height: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub scheduler: &'static str,
    pub num_outputs: u32,
}

impl<'a> GenerationParams<'a> {
    pub fn for_prompt(prompt: &'a str) -> Self {
        Self {
            prompt,
            negative_prompt: NEGATIVE_PROMPT,
            width: OUTPUT_WIDTH,
            height: OUTPUT_HEIGHT,
            num_inference_steps: INFERENCE_STEPS,
            guidance_scale: GUIDANCE_SCALE,
            scheduler: SCHEDULER,
            num_outputs: NUM_OUTPUTS,
        }
    }
}

/// Image service errors, for both submission and status checks
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Prompt is required")]
    EmptyPrompt,

    #[error("Server returned non-JSON response (status {status})")]
    NonJsonResponse { status: u16, snippet: String },

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Image API did not return a prediction ID")]
    MissingJobId,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// HTTP status of the response that caused the error, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::NonJsonResponse { status, .. } | Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether checking the same job again could give a different answer.
    ///
    /// Transport failures are always worth another try.
    pub fn retry_decision(&self) -> RetryDecision {
        match self {
            Self::Network(_) | Self::InvalidResponse(_) => RetryDecision::Retry,
            Self::NonJsonResponse { status, .. } | Self::Rejected { status, .. } => {
                StatusCode::from_u16(*status)
                    .map_or(RetryDecision::Retry, is_retryable_status)
            }
            Self::EmptyPrompt | Self::MissingJobId => RetryDecision::NoRetry,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.retry_decision() == RetryDecision::NoRetry
    }
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::Network(err) => AppError::Network(err.into_network_error()),
            GenerationError::InvalidResponse(msg) => {
                AppError::Network(NetworkError::InvalidResponse(msg))
            }
            GenerationError::EmptyPrompt => AppError::rejection(Some(400), e.to_string()),
            GenerationError::NonJsonResponse { status, .. } => {
                AppError::rejection(Some(status), e.to_string())
            }
            GenerationError::Rejected { status, message } => {
                AppError::rejection(Some(status), message)
            }
            GenerationError::MissingJobId => AppError::rejection(None, e.to_string()),
        }
    }
}
