//! Weather-to-image workflow for Skyframe
//!
//! Combines the location, weather and image job collaborators into a single
//! run with an observable state and a cancellable status poll.

pub mod orchestrator;
pub mod poller;
pub mod prompt;
pub mod state;

#[cfg(test)]
mod testing;

pub use orchestrator::Orchestrator;
pub use poller::{PollTimer, WorkflowEvent};
pub use prompt::build_prompt;
pub use state::{PollOrigin, PollOutcome, TimerAction, WorkflowState};
