//! Logging setup and synthesis spans.

mod logging;
mod tracing;

pub use logging::{init_logging, LogFormat, DEFAULT_LOG_FILTER};
pub use tracing::{LoggingTracingEmitter, NoOpTracingEmitter, SpanTimer, SynthSpanAttributes, TracingEmitter};
