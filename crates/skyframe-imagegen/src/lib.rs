//! Asynchronous image generation jobs (Replicate predictions API).
//!
//! A job is created once with [`JobService::submit`] and then observed with
//! [`JobService::poll`] until it reaches a terminal [`JobStatus`].

pub mod client;
pub mod retry;
pub mod types;

pub use client::{ImageJobClient, JobService};
pub use retry::{is_retryable_status, RetryDecision};
pub use types::*;
