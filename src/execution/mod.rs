//! Bias workflow execution

pub mod configurator;
pub mod engine;
pub mod error;
pub mod inspector;
pub mod poller;
pub mod publisher;
pub mod retriever;
pub mod runner;

pub use configurator::{BiasDescriptors, BiasJobConfigurator};
pub use engine::{EventHandler, Workflow, WorkflowEvent, WorkflowOutcome};
pub use error::{Result, WorkflowError};
pub use inspector::PipelineInspector;
pub use poller::PollPolicy;
pub use publisher::DatasetPublisher;
pub use retriever::ReportRetriever;
pub use runner::BiasJobRunner;
