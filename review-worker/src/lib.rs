//! The worker side of the pipeline: C4's review-mode router, C5's consumer
//! loop, and the C6-C10 orchestration glue that ties every other crate
//! together into one `process(request)` call per review.

pub mod consumer;
pub mod error;
pub mod orchestrator;
pub mod router;

pub use consumer::{ConsumerConfig, WorkerLoop};
pub use error::OrchestratorError;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
