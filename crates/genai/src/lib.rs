//! Client library for the remote generative model API.
//!
//! Provides typed request/response messages, a REST wrapper holding one
//! long-lived HTTP client, backend traits the orchestrator and session
//! are written against, and the frame-analysis calls built on top.

pub mod analysis;
pub mod api;
pub mod backend;
pub mod messages;
