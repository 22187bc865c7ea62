//! Capturer: redirect sinks into a pipe, run a callback, collect the output.
//!
//! One capture is a fixed cycle:
//! 1. open a pipe
//! 2. point every sink at the write end
//! 3. run the callback
//! 4. close the write end, restore stream slots (also on panic)
//! 5. read the pipe to EOF
//!
//! Reading starts only after the callback returns, so a callback must not
//! write more than the pipe buffer holds (64 KiB on Linux) or it blocks.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

use tracing::{debug, trace, warn};

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::logger::{self, Logger};
use crate::output::Output;
use crate::sink::{Classified, Sink};
use crate::slot::{self, FdSlot, StreamSlot};

/// A reusable capture session over a fixed set of sinks.
///
/// Captures take `&mut self`, so one session never runs two at once. Sinks
/// are process-wide state though: two sessions over the same sink, or other
/// threads writing to it during a capture, will interfere.
#[derive(Debug, Default)]
pub struct Capturer {
    fds: Vec<NamedFd>,
    slots: Vec<SavedSlot>,
    loggers: Vec<Logger>,
    stdlog: bool,
}

#[derive(Debug)]
struct NamedFd {
    name: &'static str,
    slot: FdSlot,
}

#[derive(Debug)]
struct SavedSlot {
    slot: StreamSlot,
    original: Output,
}

impl Capturer {
    /// Build a session, snapshotting every stream slot's current destination.
    ///
    /// # Panics
    ///
    /// - `"capturer: logger is not initialized"` for `Sink::Logger(None)`
    /// - `"capturer: unsupported writer type"` for an unknown sink name
    /// - if stdout/stderr cannot be duplicated (e.g. the descriptor is closed)
    pub fn new<I, S>(sinks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Sink>,
    {
        let mut capturer = Self::default();
        for sink in sinks {
            match sink.into().classify() {
                Classified::Stdout => capturer.push_fd("stdout", io::stdout().as_fd()),
                Classified::Stderr => capturer.push_fd("stderr", io::stderr().as_fd()),
                Classified::Slot(slot) => {
                    let original = slot.get();
                    capturer.slots.push(SavedSlot { slot, original });
                }
                Classified::Logger(logger) => capturer.loggers.push(logger),
            }
        }
        capturer
    }

    fn push_fd(&mut self, name: &'static str, fd: BorrowedFd<'_>) {
        let slot = FdSlot::snapshot(fd)
            .unwrap_or_else(|e| panic!("capturer: cannot snapshot {name}: {e}"));
        self.fds.push(NamedFd { name, slot });
    }

    /// Build a session from configured sink names and stdlog flag.
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.sinks.iter().map(String::as_str)).with_stdlog(config.stdlog)
    }

    /// Whether the default logger is redirected too.
    pub fn stdlog(&self) -> bool {
        self.stdlog
    }

    /// Also redirect the default logger ([`logger::std_logger`]).
    ///
    /// After each capture the default logger is reset to standard error,
    /// not to whatever it held before.
    pub fn set_stdlog(&mut self, enabled: bool) {
        self.stdlog = enabled;
    }

    /// Builder form of [`Capturer::set_stdlog`].
    pub fn with_stdlog(mut self, enabled: bool) -> Self {
        self.stdlog = enabled;
        self
    }

    /// Run `f` and return everything written to the sinks, as text.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD.
    pub fn output(&mut self, f: impl FnOnce()) -> Result<String, CaptureError> {
        let ((), bytes) = self.run(f)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Run `f` and return everything written to the sinks, as raw bytes.
    pub fn output_bytes(&mut self, f: impl FnOnce()) -> Result<Vec<u8>, CaptureError> {
        let ((), bytes) = self.run(f)?;
        Ok(bytes)
    }

    /// Run `f` and return its value together with the captured text.
    pub fn capture<R>(&mut self, f: impl FnOnce() -> R) -> Result<(R, String), CaptureError> {
        let (value, bytes) = self.run(f)?;
        Ok((value, String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn run<R>(&mut self, f: impl FnOnce() -> R) -> Result<(R, Vec<u8>), CaptureError> {
        let (mut reader, writer) = slot::pipe().map_err(CaptureError::Pipe)?;
        debug!(
            fds = self.fds.len(),
            slots = self.slots.len(),
            loggers = self.loggers.len(),
            stdlog = self.stdlog,
            "capture pipe opened"
        );

        let guard = self.redirect(writer)?;
        let value = f();
        drop(guard);

        let mut buf = Vec::new();
        match reader.read_to_end(&mut buf) {
            Ok(n) => {
                debug!(bytes = n, "captured output drained");
                Ok((value, buf))
            }
            Err(source) => {
                warn!(bytes = buf.len(), error = %source, "failed to drain capture pipe");
                Err(CaptureError::Drain { partial: buf, source })
            }
        }
    }

    /// Point every sink at the pipe. The returned guard undoes it.
    fn redirect(&self, write_end: std::fs::File) -> Result<Redirection<'_>, CaptureError> {
        let write_fd = write_end.as_raw_fd();
        flush_std();

        let mut guard = Redirection {
            capturer: self,
            writer: Output::pipe(write_end),
            fds_applied: 0,
            slots_applied: 0,
            stdlog_applied: false,
        };

        for named in &self.fds {
            named.slot.redirect(write_fd).map_err(|source| CaptureError::Redirect {
                sink: named.name.to_string(),
                source,
            })?;
            guard.fds_applied += 1;
        }

        for saved in &self.slots {
            saved.slot.replace(guard.writer.clone());
            guard.slots_applied += 1;
        }

        for logger in &self.loggers {
            logger.set_output(guard.writer.clone());
        }

        if self.stdlog {
            logger::set_output(guard.writer.clone());
            guard.stdlog_applied = true;
        }

        Ok(guard)
    }
}

/// Undoes a redirect on drop, including while unwinding from a panicking
/// callback.
struct Redirection<'a> {
    capturer: &'a Capturer,
    writer: Output,
    fds_applied: usize,
    slots_applied: usize,
    stdlog_applied: bool,
}

impl Drop for Redirection<'_> {
    fn drop(&mut self) {
        // Buffered std output written by the callback belongs in the capture.
        flush_std();
        self.writer.close();

        let mut failed = Vec::new();
        for named in self.capturer.fds[..self.fds_applied].iter().rev() {
            if let Err(e) = named.slot.restore() {
                failed.push((named.name, e));
            }
        }

        for saved in self.capturer.slots[..self.slots_applied].iter().rev() {
            saved.slot.replace(saved.original.clone());
        }

        if self.stdlog_applied {
            logger::set_output(Output::stderr());
        }

        // Only log once the std descriptors point back where they belong.
        for (name, error) in failed {
            warn!(sink = name, %error, "failed to restore stream after capture");
        }
        trace!(
            fds = self.fds_applied,
            slots = self.slots_applied,
            stdlog = self.stdlog_applied,
            "sinks restored"
        );
    }
}

fn flush_std() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;
    use nix::sys::stat::fstat;
    use serial_test::serial;
    use std::os::fd::RawFd;
    use std::panic::{self, AssertUnwindSafe};

    fn identity(fd: RawFd) -> (u64, u64) {
        let st = fstat(fd).unwrap();
        (st.st_dev as u64, st.st_ino as u64)
    }

    fn devnull() -> Output {
        Output::file(std::fs::OpenOptions::new().write(true).open("/dev/null").unwrap())
    }

    #[test]
    fn test_empty_capture_is_empty() {
        let slot = StreamSlot::new(devnull());
        let logger = Logger::new(devnull(), "custom");

        let mut capture = Capturer::default();
        let got = capture
            .output(|| {
                slot.write_all(b"slot").unwrap();
                logger.print("log").unwrap();
            })
            .unwrap();

        assert_eq!(got, "");
        assert!(!capture.stdlog());
    }

    #[test]
    fn test_slot_is_captured_and_restored() {
        let original = devnull();
        let slot = StreamSlot::new(original.clone());
        let mut capture = Capturer::new([&slot]);

        let got = capture.output(|| slot.write_all(b"slot text").unwrap()).unwrap();

        assert_eq!(got, "slot text");
        assert_eq!(slot.get(), original);
    }

    #[test]
    fn test_logger_stays_on_closed_pipe() {
        let logger = Logger::new(devnull(), "custom");
        let mut capture = Capturer::new([&logger]);

        let got = capture.output(|| logger.print("log").unwrap()).unwrap();

        assert_eq!(got, "customlog\n");
        let err = logger.print("after").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    #[serial]
    fn test_stdlog_is_reset_to_stderr() {
        logger::set_output(devnull());
        let mut capture = Capturer::default().with_stdlog(true);

        let got = capture.output(|| logger::print("stdlog").unwrap()).unwrap();

        assert_eq!(got, "stdlog\n");
        assert!(logger::std_logger().current_output().is_stderr());
    }

    #[test]
    fn test_session_is_reusable() {
        let slot = StreamSlot::new(devnull());
        let mut capture = Capturer::new([&slot]);

        let first = capture.output(|| slot.write_all(b"one").unwrap()).unwrap();
        let second = capture.output(|| slot.write_all(b"two").unwrap()).unwrap();

        assert_eq!(first, "one");
        assert_eq!(second, "two");
    }

    #[test]
    fn test_capture_returns_callback_value() {
        let slot = StreamSlot::new(devnull());
        let mut capture = Capturer::new([&slot]);

        let (value, got) = capture
            .capture(|| {
                slot.write_all(b"computing").unwrap();
                42
            })
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(got, "computing");
    }

    #[test]
    fn test_output_bytes_keeps_invalid_utf8() {
        let slot = StreamSlot::new(devnull());
        let mut capture = Capturer::new([&slot]);

        let bytes = capture.output_bytes(|| slot.write_all(&[0xff, b'a']).unwrap()).unwrap();
        assert_eq!(bytes, vec![0xff, b'a']);

        let text = capture.output(|| slot.write_all(&[0xff, b'a']).unwrap()).unwrap();
        assert_eq!(text, "\u{fffd}a");
    }

    #[test]
    fn test_panicking_callback_still_restores() {
        let original = devnull();
        let slot = StreamSlot::new(original.clone());
        let mut capture = Capturer::new([&slot]);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            capture.output(|| {
                slot.write_all(b"before panic").unwrap();
                panic!("callback failed");
            })
        }));

        assert!(result.is_err());
        assert_eq!(slot.get(), original);
    }

    #[test]
    fn test_destination_taken_before_capture_is_not_captured() {
        let slot = StreamSlot::new(devnull());
        let held = slot.get();
        let mut capture = Capturer::new([&slot]);

        let got = capture
            .output(|| {
                held.write_all_bytes(b"old handle").unwrap();
                slot.write_all(b"new read").unwrap();
            })
            .unwrap();

        assert_eq!(got, "new read");
    }

    #[test]
    fn test_failed_redirect_rolls_back_and_skips_callback() {
        let scratch = tempfile::tempfile().unwrap();
        let before = identity(scratch.as_raw_fd());
        let slot = StreamSlot::new(devnull());
        let original = slot.get();

        let mut capture = Capturer {
            fds: vec![
                NamedFd {
                    name: "scratch",
                    slot: FdSlot::snapshot(scratch.as_fd()).unwrap(),
                },
                NamedFd {
                    name: "bad",
                    slot: FdSlot::from_parts(1 << 30, scratch.as_fd().try_clone_to_owned().unwrap()),
                },
            ],
            slots: vec![SavedSlot {
                slot: slot.clone(),
                original: original.clone(),
            }],
            loggers: Vec::new(),
            stdlog: false,
        };

        let mut ran = false;
        let err = capture.output(|| ran = true).unwrap_err();

        match &err {
            CaptureError::Redirect { sink, source } => {
                assert_eq!(sink, "bad");
                assert_eq!(source.raw_os_error(), Some(Errno::EBADF as i32));
            }
            other => panic!("expected a redirect error, got {:?}", other),
        }
        assert!(!ran);
        assert_eq!(identity(scratch.as_raw_fd()), before);
        assert_eq!(slot.get(), original);
    }
}
