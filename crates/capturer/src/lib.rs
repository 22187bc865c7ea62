//! Capture what a function writes to stdout, stderr and loggers.
//!
//! Meant for tests that assert on text the code under test prints rather
//! than returns. A [`Capturer`] points its sinks at a pipe, runs a callback,
//! puts the stream sinks back and returns everything written.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::io::Write;
//! use capturer::{logger, Capturer, Logger, Output, Sink};
//!
//! let app_log = Logger::new(Output::stdout(), "[app] ");
//!
//! let mut capture = Capturer::new([Sink::Stdout, Sink::Stderr, Sink::from(&app_log)]);
//! capture.set_stdlog(true);
//!
//! let output = capture
//!     .output(|| {
//!         let mut out = std::io::stdout();
//!         writeln!(out, "there's").unwrap();
//!         out.flush().unwrap();
//!         eprint!("no~");
//!         logger::print("test").unwrap();
//!         app_log.print("production").unwrap();
//!     })
//!     .unwrap();
//!
//! assert_eq!(output, "there's\nno~test\n[app] production\n");
//! ```
//!
//! # Sinks
//!
//! - **Stream slots** ([`Sink::Stdout`], [`Sink::Stderr`], [`Sink::Slot`])
//!   are restored to their exact previous destination after every capture.
//! - **Loggers** ([`Sink::Logger`]) have a setter but no getter, so they stay
//!   pointed at the closed pipe afterwards and every later write fails. Call
//!   [`Logger::set_output`] yourself to put them back.
//! - **The default logger** ([`logger::std_logger`]) is redirected when
//!   [`Capturer::set_stdlog`] is on, and reset to standard error afterwards.
//!
//! # Caveats
//!
//! - Stream slots are process-wide. Tests that capture must not run in
//!   parallel with each other or with anything else writing to those sinks.
//! - `print!`/`println!` inside `cargo test` go to the test harness, not to
//!   file descriptor 1. Write through `std::io::stdout()` to be captured.
//! - Buffered writers must be flushed inside the callback for their bytes to
//!   keep their place in the interleaved output.
//! - Writes from threads still running after the callback returns may or may
//!   not be captured.

pub mod capturer;
pub mod config;
pub mod error;
pub mod logger;
pub mod output;
pub mod sink;
pub mod slot;

pub use capturer::Capturer;
pub use config::CaptureConfig;
pub use error::CaptureError;
pub use logger::Logger;
pub use output::Output;
pub use sink::Sink;
pub use slot::StreamSlot;
