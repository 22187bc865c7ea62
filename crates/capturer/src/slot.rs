//! Stream slots: process-wide cells that hold the current output destination.
//!
//! Two kinds exist:
//! - [`StreamSlot`]: an in-process cell other code reads before writing.
//! - The process descriptor table entries for stdout and stderr, redirected
//!   with `dup2` (see [`FdSlot`]).
//!
//! Redirecting a slot only affects code that reads it afterwards. Anyone who
//! already took the destination by value keeps writing to the old one.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::{Arc, RwLock};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::unistd;

use crate::output::Output;

/// A shared, mutable cell holding the current [`Output`].
///
/// Typically stored in a `static` so application code can write through it:
///
/// ```rust
/// use std::sync::LazyLock;
/// use capturer::{Output, StreamSlot};
///
/// static REPORT: LazyLock<StreamSlot> = LazyLock::new(|| StreamSlot::new(Output::stdout()));
///
/// REPORT.write_all(b"ready\n").unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct StreamSlot(Arc<RwLock<Output>>);

impl StreamSlot {
    pub fn new(output: Output) -> Self {
        Self(Arc::new(RwLock::new(output)))
    }

    /// The destination currently held by the slot.
    pub fn get(&self) -> Output {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Put a new destination in the slot, returning the previous one.
    pub fn replace(&self, output: Output) -> Output {
        let mut guard = match self.0.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, output)
    }

    /// Write through whatever destination the slot holds right now.
    pub fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        self.get().write_all_bytes(buf)
    }

    /// Whether two handles refer to the same slot.
    pub fn same_slot(&self, other: &StreamSlot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A descriptor table entry (stdout or stderr) plus a duplicate of the open
/// file description it held when snapshotted.
#[derive(Debug)]
pub(crate) struct FdSlot {
    fd: RawFd,
    original: OwnedFd,
}

impl FdSlot {
    /// Duplicate `fd` (close-on-exec) so it can be restored later.
    pub(crate) fn snapshot(fd: BorrowedFd<'_>) -> io::Result<Self> {
        let original = fd.try_clone_to_owned()?;
        Ok(Self {
            fd: fd.as_raw_fd(),
            original,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(fd: RawFd, original: OwnedFd) -> Self {
        Self { fd, original }
    }

    /// Point the descriptor at `target`.
    pub(crate) fn redirect(&self, target: RawFd) -> io::Result<()> {
        unistd::dup2(target, self.fd)?;
        Ok(())
    }

    /// Point the descriptor back at the snapshotted file description.
    pub(crate) fn restore(&self) -> io::Result<()> {
        unistd::dup2(self.original.as_raw_fd(), self.fd)?;
        Ok(())
    }
}

/// Open an anonymous pipe. Both ends are close-on-exec.
pub(crate) fn pipe() -> io::Result<(File, File)> {
    let (read, write) = unistd::pipe()?;
    for end in [&read, &write] {
        fcntl(end.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((File::from(read), File::from(write)))
}
