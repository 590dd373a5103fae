//! Emission sinks implementing [`EmissionSink`](crate::ports::EmissionSink)

mod jsonl_sink;
mod log_sink;

pub use jsonl_sink::JsonlSink;
pub use log_sink::LogSink;
