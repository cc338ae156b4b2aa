//! Pipelines built on the separation layer
//!
//! - `job`: one input recording in, one WAV per speaker out
//! - `export`: freeze the model into a portable graph and smoke-test it

pub mod export;
pub mod job;

pub use export::{export_stage, run_stages, verify_stage, StageResults, VerificationReport};
pub use job::{Job, JobRequest, JobState};
