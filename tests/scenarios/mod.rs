//! Scenario-based tests for bias-pipeline

mod follow_up;
mod job_outcome;
mod model_lookup;
mod polling;
mod submission;
