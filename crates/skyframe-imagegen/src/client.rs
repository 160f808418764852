//! Replicate predictions API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use skyframe_core::ImageConfig;
use tracing::instrument;

use crate::types::{GenerationError, GenerationJob, GenerationParams, JobStatus};

/// How much of a non-JSON body is kept for diagnostics
const NON_JSON_SNIPPET_CHARS: usize = 150;

/// Submission and status checks for generation jobs
#[async_trait]
pub trait JobService: Send + Sync {
    /// Start a job for `prompt`. Never retried.
    async fn submit(&self, prompt: &str) -> Result<GenerationJob, GenerationError>;

    /// Fetch the current state of a job, one remote call per invocation.
    async fn poll(&self, job_id: &str) -> Result<GenerationJob, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct PredictionBody {
    id: Option<String>,
    /// Job status string; error bodies carry the HTTP status number here
    status: Option<Value>,
    output: Option<Value>,
    error: Option<Value>,
    detail: Option<String>,
}

impl PredictionBody {
    /// Error text from either the prediction `error` or an API `detail`
    fn error_message(&self) -> Option<String> {
        self.error
            .as_ref()
            .and_then(error_text)
            .or_else(|| self.detail.clone().filter(|d| !d.is_empty()))
    }

    fn into_job(self) -> Result<GenerationJob, GenerationError> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or(GenerationError::MissingJobId)?;

        let status = self
            .status
            .as_ref()
            .and_then(Value::as_str)
            .map(JobStatus::parse)
            .ok_or_else(|| GenerationError::InvalidResponse("missing job status".to_string()))?;

        let mut output = Vec::new();
        if let Some(value) = &self.output {
            extract_output_urls(value, &mut output);
        }

        Ok(GenerationJob {
            id,
            status,
            output,
            error: self.error.as_ref().and_then(error_text),
        })
    }
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Collect image URLs from an `output` value of any shape. Entries are kept
/// as given, so data URIs and relative paths survive.
fn extract_output_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(url) => {
            let trimmed = url.trim();
            if !trimmed.is_empty() && !out.iter().any(|existing| existing == trimmed) {
                out.push(trimmed.to_string());
            }
        }
        Value::Array(items) => {
            for item in items {
                extract_output_urls(item, out);
            }
        }
        Value::Object(obj) => {
            if let Some(url) = obj.get("url") {
                extract_output_urls(url, out);
            }
        }
        _ => {}
    }
}

/// Read a response body as a prediction, telling HTML error pages apart from
/// JSON error bodies.
async fn read_prediction(response: Response) -> Result<(StatusCode, PredictionBody), GenerationError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    if !is_json {
        let text = response.text().await.unwrap_or_default();
        let snippet: String = text.chars().take(NON_JSON_SNIPPET_CHARS).collect();
        tracing::error!("Non-JSON response ({}): {}...", status, snippet);
        return Err(GenerationError::NonJsonResponse {
            status: status.as_u16(),
            snippet,
        });
    }

    match response.json::<PredictionBody>().await {
        Ok(body) => Ok((status, body)),
        Err(e) if !status.is_success() => Err(GenerationError::Rejected {
            status: status.as_u16(),
            message: format!("{} ({})", status, e),
        }),
        Err(e) => Err(GenerationError::InvalidResponse(e.to_string())),
    }
}

/// Replicate API client
#[derive(Debug, Clone)]
pub struct ImageJobClient {
    client: Arc<Client>,
    base_url: String,
    api_token: Option<String>,
    model: String,
}

impl ImageJobClient {
    pub fn new(config: &ImageConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        if config.api_token.is_none() {
            tracing::warn!("No image API token configured - requests will likely be rejected");
        }

        Ok(Self {
            client: Arc::new(client),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            model: config.model.clone(),
        })
    }

    /// Build a client against an arbitrary endpoint (mock servers, proxies)
    pub fn with_base_url(
        base_url: &str,
        api_token: Option<String>,
        model: &str,
    ) -> Result<Self, GenerationError> {
        let config = ImageConfig {
            api_url: base_url.to_string(),
            api_token,
            model: model.to_string(),
            ..ImageConfig::default()
        };
        Self::new(&config)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build request with auth headers
    fn build_request(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header(header::ACCEPT, "application/json");
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Create a prediction for the configured model.
    #[instrument(skip(self, prompt), fields(model = %self.model), level = "info")]
    pub async fn create_prediction(&self, prompt: &str) -> Result<GenerationJob, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let url = format!("{}/models/{}/predictions", self.base_url, self.model);
        let body = serde_json::json!({ "input": GenerationParams::for_prompt(prompt) });

        let response = self
            .build_request(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        let (status, body) = read_prediction(response).await?;

        if !status.is_success() || body.error.as_ref().and_then(error_text).is_some() {
            let message = body.error_message().unwrap_or_else(|| {
                format!(
                    "Failed to start image generation (Status: {})",
                    status.as_u16()
                )
            });
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let job = body.into_job()?;
        tracing::info!("Created prediction {} ({})", job.id, job.status);
        Ok(job)
    }

    /// Fetch a prediction by id.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_prediction(&self, job_id: &str) -> Result<GenerationJob, GenerationError> {
        if job_id.trim().is_empty() {
            return Err(GenerationError::MissingJobId);
        }

        let url = format!("{}/predictions/{}", self.base_url, job_id);

        let response = self.build_request(self.client.get(&url)).send().await?;

        let (status, mut body) = read_prediction(response).await?;

        if !status.is_success() {
            let message = body.error_message().unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        if body.id.is_none() {
            body.id = Some(job_id.to_string());
        }

        body.into_job()
    }
}

#[async_trait]
impl JobService for ImageJobClient {
    async fn submit(&self, prompt: &str) -> Result<GenerationJob, GenerationError> {
        self.create_prediction(prompt).await
    }

    async fn poll(&self, job_id: &str) -> Result<GenerationJob, GenerationError> {
        self.get_prediction(job_id).await
    }
}
