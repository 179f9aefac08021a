//! Core domain models
//!
//! Inert records describing the dataset, the training pipeline run, the
//! bias analysis and the processing job. Nothing here talks to a service.

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod job;
pub mod location;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod state;
pub mod step;

pub use analysis::*;
pub use dataset::*;
pub use job::*;
pub use location::S3Uri;
pub use metrics::{MetricCode, MetricPhase};
pub use pipeline::*;
pub use report::*;
pub use state::*;
pub use step::*;
