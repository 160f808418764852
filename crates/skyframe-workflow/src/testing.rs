//! In-memory collaborators for timer and orchestrator tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use skyframe_imagegen::{GenerationError, GenerationJob, JobService, JobStatus};
use skyframe_weather::{Location, WeatherInfo, WeatherSource};

pub fn job(id: &str, status: JobStatus, output: &[&str]) -> GenerationJob {
    GenerationJob {
        id: id.to_string(),
        status,
        output: output.iter().map(|s| s.to_string()).collect(),
        error: None,
    }
}

/// Job service answering from queued responses.
///
/// Once a queue is empty, submissions start `job-default` and checks report
/// `processing` for whatever id was asked.
#[derive(Default)]
pub struct ScriptedJobs {
    submits: Mutex<VecDeque<Result<GenerationJob, GenerationError>>>,
    polls: Mutex<VecDeque<Result<GenerationJob, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
    polled: Mutex<Vec<String>>,
}

impl ScriptedJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submit(self, result: Result<GenerationJob, GenerationError>) -> Self {
        self.submits.lock().push_back(result);
        self
    }

    pub fn with_poll(self, result: Result<GenerationJob, GenerationError>) -> Self {
        self.polls.lock().push_back(result);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn polled_ids(&self) -> Vec<String> {
        self.polled.lock().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polled.lock().len()
    }
}

#[async_trait]
impl JobService for ScriptedJobs {
    async fn submit(&self, prompt: &str) -> Result<GenerationJob, GenerationError> {
        self.prompts.lock().push(prompt.to_string());
        let next = self.submits.lock().pop_front();
        next.unwrap_or_else(|| Ok(job("job-default", JobStatus::Starting, &[])))
    }

    async fn poll(&self, job_id: &str) -> Result<GenerationJob, GenerationError> {
        self.polled.lock().push(job_id.to_string());
        let next = self.polls.lock().pop_front();
        next.unwrap_or_else(|| Ok(job(job_id, JobStatus::Processing, &[])))
    }
}

/// Weather source with a fixed answer
pub struct StaticWeather(pub WeatherInfo);

#[async_trait]
impl WeatherSource for StaticWeather {
    async fn fetch_weather(&self, _location: &Location) -> WeatherInfo {
        self.0.clone()
    }
}
