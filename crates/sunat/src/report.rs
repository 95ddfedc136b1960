//! Diagnostic reporting.
//!
//! Long-running operations take a [`Reporter`] so progress and warnings
//! reach the operator without the library deciding how they are rendered.
//! Command results proper (ticket ids, saved paths) are return values, not
//! reporter lines, and credentials never pass through here.

/// Sink for human-facing diagnostics.
pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Reporter that discards every message, for embedding the client where
/// diagnostics have nowhere to go.
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn info(&mut self, _msg: &str) {}
    fn warn(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}
