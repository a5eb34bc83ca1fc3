//! Scoped capture of test output.
//!
//! While a [`CaptureGuard`] is alive on a thread, everything written through
//! [`out!`](crate::out), [`outln!`](crate::outln), [`eout!`](crate::eout),
//! [`eoutln!`](crate::eoutln) or an [`output()`] / [`error_output()`] handle is
//! appended, in write order, to a single in-memory buffer. With no capture
//! active the same calls forward to the real stdout/stderr.
//!
//! ## Panics
//!
//! [`install_panic_hook`] installs (once per process) a hook that writes the
//! panic message and location into the panicking thread's capture buffer.
//! Threads without an active capture fall through to the hook that was
//! installed before it, so ordinary panics keep their usual report.
//!
//! ## Thread Safety
//!
//! The buffer lives in thread-local storage; captures on different threads
//! never observe each other. Guards restore the previous state on drop, so
//! captures nest and are released on unwinding.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::Once;

thread_local! {
    static CAPTURE: RefCell<Option<String>> = const { RefCell::new(None) };
    static PANIC_REPORTED: Cell<bool> = const { Cell::new(false) };
}

static PANIC_HOOK: Once = Once::new();

/// Which standard stream a write would reach when no capture is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// RAII guard for an active capture.
///
/// Dropping the guard without calling [`CaptureGuard::finish`] discards the
/// captured text and restores whatever capture was active before.
pub struct CaptureGuard {
    previous: Option<Option<String>>,
}

impl CaptureGuard {
    /// Start capturing on the current thread.
    #[must_use]
    pub fn begin() -> Self {
        install_panic_hook();
        let previous = CAPTURE.with(|slot| slot.replace(Some(String::new())));
        Self {
            previous: Some(previous),
        }
    }

    /// Stop capturing and return everything written since [`CaptureGuard::begin`].
    pub fn finish(mut self) -> String {
        self.restore().unwrap_or_default()
    }

    fn restore(&mut self) -> Option<String> {
        let previous = self.previous.take()?;
        CAPTURE.with(|slot| slot.replace(previous))
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Run `f` with its output captured and return the captured text.
///
/// A panic inside `f` does not propagate: its report is appended to the
/// captured text instead.
pub fn capture<F: FnOnce()>(f: F) -> String {
    let guard = CaptureGuard::begin();
    PANIC_REPORTED.with(|flag| flag.set(false));

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        // Another hook replaced ours; fall back to the payload alone.
        if !PANIC_REPORTED.with(|flag| flag.replace(false)) {
            append(&format!("panicked:\n{}\n", payload_message(&*payload)));
        }
    }

    guard.finish()
}

/// Whether a capture is active on the current thread.
pub fn is_capturing() -> bool {
    CAPTURE
        .try_with(|slot| slot.try_borrow().map(|s| s.is_some()).unwrap_or(false))
        .unwrap_or(false)
}

/// Write formatted text to the active capture, or to `stream` if none is active.
///
/// This is the target of the `out!` family of macros.
pub fn write(stream: Stream, args: fmt::Arguments<'_>) {
    // Format before touching the buffer so a panicking Display impl never
    // leaves it borrowed.
    let text = fmt::format(args);
    if append(&text) {
        return;
    }
    match stream {
        Stream::Stdout => print!("{text}"),
        Stream::Stderr => eprint!("{text}"),
    }
}

/// Append to the active capture. Returns `false` when nothing is capturing.
fn append(text: &str) -> bool {
    CAPTURE
        .try_with(|slot| match slot.try_borrow_mut() {
            Ok(mut slot) => match slot.as_mut() {
                Some(buffer) => {
                    buffer.push_str(text);
                    true
                }
                None => false,
            },
            Err(_) => false,
        })
        .unwrap_or(false)
}

/// An [`io::Write`] handle onto the capture-aware output.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    stream: Stream,
}

/// Capture-aware handle for stdout-flavoured writes.
pub fn output() -> Output {
    Output {
        stream: Stream::Stdout,
    }
}

/// Capture-aware handle for stderr-flavoured writes.
pub fn error_output() -> Output {
    Output {
        stream: Stream::Stderr,
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if append(&String::from_utf8_lossy(buf)) {
            return Ok(buf.len());
        }
        match self.stream {
            Stream::Stdout => io::stdout().write(buf),
            Stream::Stderr => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if is_capturing() {
            return Ok(());
        }
        match self.stream {
            Stream::Stdout => io::stdout().flush(),
            Stream::Stderr => io::stderr().flush(),
        }
    }
}

/// Install the capture-aware panic hook. Subsequent calls are no-ops.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if append(&panic_report(info)) {
                let _ = PANIC_REPORTED.try_with(|flag| flag.set(true));
            } else {
                previous(info);
            }
        }));
    });
}

fn panic_report(info: &PanicHookInfo<'_>) -> String {
    let message = payload_message(info.payload());
    match info.location() {
        Some(location) => format!(
            "panicked at {}:{}:{}:\n{message}\n",
            location.file(),
            location.line(),
            location.column()
        ),
        None => format!("panicked:\n{message}\n"),
    }
}

fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_collects_both_streams_in_order() {
        let text = capture(|| {
            write(Stream::Stdout, format_args!("one\n"));
            write(Stream::Stderr, format_args!("two\n"));
            write(Stream::Stdout, format_args!("three"));
        });
        assert_eq!(text, "one\ntwo\nthree");
    }

    #[test]
    fn test_capture_is_released_after_return() {
        let _ = capture(|| write(Stream::Stdout, format_args!("x")));
        assert!(!is_capturing());
    }

    #[test]
    fn test_capture_is_released_after_panic() {
        let text = capture(|| panic!("boom"));
        assert!(!is_capturing());
        assert!(text.starts_with("panicked at "), "got {text:?}");
        assert!(text.ends_with("boom\n"), "got {text:?}");
    }

    #[test]
    fn test_nested_captures_restore_outer_buffer() {
        let outer = capture(|| {
            write(Stream::Stdout, format_args!("outer-before\n"));
            let inner = capture(|| write(Stream::Stdout, format_args!("inner\n")));
            assert_eq!(inner, "inner\n");
            write(Stream::Stdout, format_args!("outer-after\n"));
        });
        assert_eq!(outer, "outer-before\nouter-after\n");
    }

    #[test]
    fn test_dropped_guard_discards_text() {
        {
            let _guard = CaptureGuard::begin();
            write(Stream::Stdout, format_args!("discarded"));
            assert!(is_capturing());
        }
        assert!(!is_capturing());
    }

    #[test]
    fn test_output_handle_writes_into_capture() {
        let text = capture(|| {
            let mut out = output();
            writeln!(out, "value = {}", 42).unwrap();
            let mut err = error_output();
            write!(err, "warned").unwrap();
            err.flush().unwrap();
        });
        assert_eq!(text, "value = 42\nwarned");
    }

    #[test]
    fn test_payload_message_for_formatted_panic() {
        let text = capture(|| panic!("failed with {}", 7));
        assert!(text.contains("failed with 7"));
    }
}
