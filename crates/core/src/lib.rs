//! Domain types and local media utilities shared by every reframe crate.
//!
//! Holds the generation job state machine, the polling policy, prompt
//! validation, scoped local asset handles, and the ffmpeg-backed frame
//! extractor.

pub mod assets;
pub mod error;
pub mod ffmpeg;
pub mod generation;
pub mod prompt;
pub mod types;
