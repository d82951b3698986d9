//! The gateway side of the pipeline: C3's webhook ingestion, the
//! correlation-id middleware at the HTTP boundary, and C8's result
//! subscriber that turns a completed review into provider comments.

pub mod core;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod subscriber;

pub use core::app_state::AppState;
pub use error::GatewayError;
pub use routes::build_router;
