//! Run events: the user-facing execution log and its JSONL sink

mod log;

pub use log::{ExecutionLog, LogEntry, LogLevel, read_execution_log};
