//! Sink descriptors accepted by [`Capturer::new`](crate::Capturer::new).

use crate::logger::Logger;
use crate::slot::StreamSlot;

/// Something a capturer can redirect.
///
/// Stream slots (`Stdout`, `Stderr`, `Slot`) are restored after every capture.
/// Loggers are redirected with [`Logger::set_output`] and left pointing at the
/// closed capture pipe, since their previous destination cannot be read back.
#[derive(Debug, Clone)]
pub enum Sink {
    /// Process standard output, file descriptor 1.
    Stdout,
    /// Process standard error, file descriptor 2.
    Stderr,
    /// An in-process stream slot.
    Slot(StreamSlot),
    /// A logger. `None` stands for a logger that was never set up.
    Logger(Option<Logger>),
    /// A sink given by name: `"stdout"` or `"stderr"`.
    Named(String),
}

/// A sink after classification.
#[derive(Debug)]
pub(crate) enum Classified {
    Stdout,
    Stderr,
    Slot(StreamSlot),
    Logger(Logger),
}

impl Sink {
    /// Resolve the descriptor to one of the supported kinds.
    ///
    /// # Panics
    ///
    /// On an uninitialized logger or an unknown name.
    pub(crate) fn classify(self) -> Classified {
        match self {
            Sink::Stdout => Classified::Stdout,
            Sink::Stderr => Classified::Stderr,
            Sink::Slot(slot) => Classified::Slot(slot),
            Sink::Logger(Some(logger)) => Classified::Logger(logger),
            Sink::Logger(None) => panic!("capturer: logger is not initialized"),
            Sink::Named(name) => match name.trim() {
                "stdout" => Sink::Stdout.classify(),
                "stderr" => Sink::Stderr.classify(),
                _ => panic!("capturer: unsupported writer type"),
            },
        }
    }
}

impl From<StreamSlot> for Sink {
    fn from(slot: StreamSlot) -> Self {
        Sink::Slot(slot)
    }
}

impl From<&StreamSlot> for Sink {
    fn from(slot: &StreamSlot) -> Self {
        Sink::Slot(slot.clone())
    }
}

impl From<Logger> for Sink {
    fn from(logger: Logger) -> Self {
        Sink::Logger(Some(logger))
    }
}

impl From<&Logger> for Sink {
    fn from(logger: &Logger) -> Self {
        Sink::Logger(Some(logger.clone()))
    }
}

impl From<Option<Logger>> for Sink {
    fn from(logger: Option<Logger>) -> Self {
        Sink::Logger(logger)
    }
}

impl From<&str> for Sink {
    fn from(name: &str) -> Self {
        Sink::Named(name.to_string())
    }
}

impl From<String> for Sink {
    fn from(name: String) -> Self {
        Sink::Named(name)
    }
}
