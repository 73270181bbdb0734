//! Observability utilities.

mod spans;
mod subscriber;

pub use spans::{execution_span, stage_span};
pub use subscriber::{init_tracing, LogFormat, DEFAULT_FILTER};
