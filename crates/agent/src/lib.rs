//! The siteforge agent loop.
//!
//! One [`AgentLoop`] instance serves all sessions; each `run()` call owns
//! its conversation state for the duration of one run and drives the
//! reason → act cycle: invoke the model, execute the tools it requests,
//! feed results back, repeat until the model answers with no tool requests
//! or the iteration bound is hit.

mod loop_runner;

pub use loop_runner::{AgentLoop, DEFAULT_MAX_ITERATIONS};
