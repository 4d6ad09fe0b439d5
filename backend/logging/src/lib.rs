//! Structured logging for fundsync.
//!
//! Console output (text or JSON), optional daily-rolling NDJSON files, and
//! redaction of credentials before untrusted payloads reach the log.

pub mod logger;
pub mod redact;

pub use logger::init_logger;
pub use redact::{redact_sensitive_data, truncate_for_log};
