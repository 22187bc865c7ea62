//! Misconfigured sinks fail when the capturer is built, never at capture time.

use std::panic;

use capturer::{Capturer, CaptureConfig, Logger, Sink};

fn panic_message(f: impl FnOnce() + panic::UnwindSafe) -> String {
    let payload = panic::catch_unwind(f).expect_err("expected a panic");
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        panic!("panic payload is not a string")
    }
}

#[test]
fn test_uninitialized_logger() {
    let msg = panic_message(|| {
        let logger: Option<Logger> = None;
        Capturer::new([Sink::from(logger)]);
    });
    assert_eq!(msg, "capturer: logger is not initialized");
}

#[test]
fn test_unsupported_writer() {
    let msg = panic_message(|| {
        Capturer::new(["unsupported"]);
    });
    assert_eq!(msg, "capturer: unsupported writer type");
}

#[test]
fn test_unsupported_name_from_config() {
    let config = CaptureConfig::with_sinks(["stdout", "syslog"]);
    let msg = panic_message(move || {
        Capturer::from_config(&config);
    });
    assert_eq!(msg, "capturer: unsupported writer type");
}

#[test]
fn test_config_sets_stdlog() {
    let config = CaptureConfig {
        sinks: Vec::new(),
        stdlog: true,
    };
    assert!(Capturer::from_config(&config).stdlog());
    assert!(!Capturer::from_config(&CaptureConfig::default()).stdlog());
}
