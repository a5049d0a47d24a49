//! Session layer for the reframe command-line client.
//!
//! [`session::Studio`] holds the state a user works with (source video,
//! analysis, editable prompt, generated video) and turns every failure
//! into a single human-readable message.

pub mod config;
pub mod session;
