//! Minion runtime: HTTP ingress, startup orchestration and shutdown.

mod error;
pub mod handler;
pub mod protocol;
pub mod routes;
mod runtime;

pub use error::DaemonError;
pub use handler::LoggingHandler;
pub use protocol::{
    request_health, request_progress, request_recrawl, HookResponse, ProgressResponse,
    RecrawlResponse,
};
pub use routes::router;
pub use runtime::{init_tracing, run, serve, start_blocking};
