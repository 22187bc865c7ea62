//! Errors returned by a capture.
//!
//! Only runtime resource failures are returned. Misconfigured sinks are
//! programming mistakes and panic when the capturer is built.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The pipe could not be created. Nothing was redirected.
    #[error("failed to open capture pipe: {0}")]
    Pipe(#[source] io::Error),

    /// A stream slot could not be pointed at the pipe. The callback did not run.
    #[error("failed to redirect {sink}: {source}")]
    Redirect {
        sink: String,
        #[source]
        source: io::Error,
    },

    /// Reading the pipe failed. `partial` holds what was read before that.
    #[error("failed to read captured output after {} bytes: {source}", .partial.len())]
    Drain {
        partial: Vec<u8>,
        #[source]
        source: io::Error,
    },
}

impl CaptureError {
    /// Text drained before a [`CaptureError::Drain`] failure.
    pub fn partial_output(&self) -> Option<String> {
        match self {
            CaptureError::Drain { partial, .. } => Some(String::from_utf8_lossy(partial).into_owned()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_error_keeps_partial_output() {
        let err = CaptureError::Drain {
            partial: b"half a li".to_vec(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "gone"),
        };
        assert_eq!(err.partial_output().as_deref(), Some("half a li"));
        assert_eq!(err.to_string(), "failed to read captured output after 9 bytes: gone");
    }

    #[test]
    fn test_other_errors_have_no_partial_output() {
        let err = CaptureError::Pipe(io::Error::from(nix::errno::Errno::EMFILE));
        assert!(err.partial_output().is_none());
        assert!(err.to_string().starts_with("failed to open capture pipe"));
    }
}
