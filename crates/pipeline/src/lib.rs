//! Generation job orchestration.
//!
//! [`orchestrator::run_generation_job`] drives one remote video
//! generation from submission to a terminal state, reporting each step
//! as a [`events::GenerationEvent`].

pub mod error;
pub mod events;
pub mod orchestrator;

pub use error::GenerationError;
pub use events::{progress_channel, GenerationEvent, ProgressReceiver, ProgressSender};
pub use orchestrator::{run_generation_job, GeneratedVideo};
