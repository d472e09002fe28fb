//! td-query
//!
//! Builds a `TD_TIME_RANGE` query from command line arguments, runs it as a
//! job on the remote analytics service and prints the result.

pub mod app;
pub mod args;
pub mod error;
pub mod logging;
pub mod query;
pub mod sink;

pub use app::{execute, run_cli, EXIT_FAILURE, EXIT_SUCCESS};
pub use args::{Cli, Invocation};
pub use error::ArgumentError;
pub use logging::{initialize_logging, LogFormat};
pub use query::{QueryBuilder, TimeBound};
pub use sink::{ResultSink, RESULT_HEADER, RESULT_TRAILER};
