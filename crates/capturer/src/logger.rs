//! Line loggers with a replaceable destination.
//!
//! A [`Logger`] exposes [`Logger::set_output`] but deliberately no getter, so
//! a capturer can point it at a pipe and cannot put the old destination back.
//! Callers that need the old destination restored call `set_output` again
//! themselves.
//!
//! The process-wide default logger ([`std_logger`]) writes to standard error
//! until someone changes it.

use std::fmt::Display;
use std::io;
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::fmt::MakeWriter;

use crate::output::Output;

/// A cloneable logger that writes `prefix + message` lines to an [`Output`].
///
/// Clones share the destination, so redirecting one clone redirects all.
#[derive(Clone)]
pub struct Logger(Arc<Inner>);

struct Inner {
    prefix: String,
    output: Mutex<Output>,
}

impl Logger {
    pub fn new(output: Output, prefix: impl Into<String>) -> Self {
        Self(Arc::new(Inner {
            prefix: prefix.into(),
            output: Mutex::new(output),
        }))
    }

    pub fn prefix(&self) -> &str {
        &self.0.prefix
    }

    /// Replace the destination for this logger and all its clones.
    pub fn set_output(&self, output: Output) {
        *self.lock() = output;
    }

    /// Write one line. A newline is appended unless the message ends with one.
    ///
    /// The line goes out in a single write while the logger is locked, so
    /// lines from concurrent callers never interleave.
    pub fn print(&self, message: impl Display) -> io::Result<()> {
        let mut line = format!("{}{}", self.0.prefix, message);
        if !line.ends_with('\n') {
            line.push('\n');
        }
        let output = self.lock();
        output.write_all_bytes(line.as_bytes())
    }

    /// Whether two handles refer to the same logger.
    pub fn same_logger(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[cfg(test)]
    pub(crate) fn current_output(&self) -> Output {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Output> {
        self.0.output.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("prefix", &self.0.prefix)
            .finish_non_exhaustive()
    }
}

/// Lets a `tracing_subscriber::fmt` layer emit through a logger.
///
/// Formatted events are written as-is, without the logger prefix.
impl<'a> MakeWriter<'a> for Logger {
    type Writer = Output;

    fn make_writer(&'a self) -> Self::Writer {
        self.lock().clone()
    }
}

/// The process-wide default logger.
///
/// Starts out writing to standard error with an empty prefix.
pub fn std_logger() -> &'static Logger {
    static STD: OnceLock<Logger> = OnceLock::new();
    STD.get_or_init(|| Logger::new(Output::stderr(), ""))
}

/// Write one line through the default logger.
pub fn print(message: impl Display) -> io::Result<()> {
    std_logger().print(message)
}

/// Point the default logger somewhere else.
pub fn set_output(output: Output) {
    std_logger().set_output(output);
}
