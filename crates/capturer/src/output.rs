//! Output: a shared handle to a byte destination.
//!
//! Stream slots and loggers hold an `Output` rather than a concrete writer so
//! the capturer can swap destinations without knowing who writes through them.
//! Clones share the underlying destination.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// A cloneable handle to a destination for bytes.
///
/// Two handles compare equal when they name the same destination: both
/// standard output, both standard error, or clones of the same file/pipe
/// handle. Two separately opened handles to the same file are not equal.
#[derive(Clone)]
pub struct Output(Arc<Target>);

enum Target {
    Stdout,
    Stderr,
    File(File),
    /// Write end of a capture pipe. `None` once closed.
    Pipe(Mutex<Option<File>>),
}

impl Output {
    /// The process standard output (file descriptor 1).
    pub fn stdout() -> Self {
        Self(Arc::new(Target::Stdout))
    }

    /// The process standard error (file descriptor 2).
    pub fn stderr() -> Self {
        Self(Arc::new(Target::Stderr))
    }

    /// An already opened file, socket or device.
    pub fn file(file: File) -> Self {
        Self(Arc::new(Target::File(file)))
    }

    /// The write end of a capture pipe.
    pub(crate) fn pipe(write_end: File) -> Self {
        Self(Arc::new(Target::Pipe(Mutex::new(Some(write_end)))))
    }

    /// Whether this is the process standard error.
    pub fn is_stderr(&self) -> bool {
        matches!(*self.0, Target::Stderr)
    }

    /// Whether this is the process standard output.
    pub fn is_stdout(&self) -> bool {
        matches!(*self.0, Target::Stdout)
    }

    /// Close a pipe output for every clone. No-op for other outputs.
    ///
    /// Later writes through any clone fail with `BrokenPipe`.
    pub(crate) fn close(&self) {
        if let Target::Pipe(slot) = &*self.0 {
            lock(slot).take();
        }
    }

    /// Write the whole buffer with a single destination lock held.
    pub fn write_all_bytes(&self, buf: &[u8]) -> io::Result<()> {
        match &*self.0 {
            Target::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(buf)?;
                out.flush()
            }
            Target::Stderr => io::stderr().lock().write_all(buf),
            Target::File(file) => (&*file).write_all(buf),
            Target::Pipe(slot) => match lock(slot).as_ref() {
                Some(mut file) => file.write_all(buf),
                None => Err(closed()),
            },
        }
    }
}

fn lock(slot: &Mutex<Option<File>>) -> MutexGuard<'_, Option<File>> {
    // A panic while writing leaves the file handle itself intact.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "capture pipe is closed")
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &*self.0 {
            Target::Stdout => io::stdout().write(buf),
            Target::Stderr => io::stderr().write(buf),
            Target::File(file) => (&*file).write(buf),
            Target::Pipe(slot) => match lock(slot).as_ref() {
                Some(mut file) => file.write(buf),
                None => Err(closed()),
            },
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all_bytes(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &*self.0 {
            Target::Stdout => io::stdout().flush(),
            Target::Stderr => io::stderr().flush(),
            Target::File(file) => (&*file).flush(),
            Target::Pipe(_) => Ok(()),
        }
    }
}

impl PartialEq for Output {
    fn eq(&self, other: &Self) -> bool {
        match (&*self.0, &*other.0) {
            (Target::Stdout, Target::Stdout) | (Target::Stderr, Target::Stderr) => true,
            _ => Arc::ptr_eq(&self.0, &other.0),
        }
    }
}

impl Eq for Output {}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            Target::Stdout => write!(f, "Output::Stdout"),
            Target::Stderr => write!(f, "Output::Stderr"),
            Target::File(file) => f.debug_tuple("Output::File").field(file).finish(),
            Target::Pipe(slot) => {
                let state = if lock(slot).is_some() { "open" } else { "closed" };
                write!(f, "Output::Pipe({state})")
            }
        }
    }
}
