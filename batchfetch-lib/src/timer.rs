//! Timing helpers for logging how long an operation took.
//!
//! [`timed`] wraps a future, [`LogTime`] times a scope. Both only observe:
//! the wrapped operation's output is passed through untouched.
//!
//! ```
//! use batchfetch_lib::{LogTime, timed};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sum = timed("sum", async { 1 + 2 }).await;
//! assert_eq!(sum, 3);
//!
//! {
//!     let _timer = LogTime::new("parsing");
//!     // ...
//! } // logs "parsing finished in ...s"
//! # }
//! ```

use std::future::Future;
use std::time::Instant;

use log::{Level, log};

/// Await `future` and log its duration at `info` level
pub async fn timed<F: Future>(label: &str, future: F) -> F::Output {
    timed_with_level(label, Level::Info, future).await
}

/// Await `future` and log its duration at the given level
pub async fn timed_with_level<F: Future>(label: &str, level: Level, future: F) -> F::Output {
    let _timer = LogTime::with_level(label, level)
        .format(|label, secs| format!("{label} took {secs:.4}s"));
    future.await
}

type Formatter = fn(&str, f64) -> String;

/// Logs the time between its creation and being dropped.
///
/// The message is logged even when the scope is left by unwinding.
#[derive(Debug)]
pub struct LogTime {
    label: String,
    level: Level,
    start: Instant,
    format: Formatter,
}

impl LogTime {
    /// Start timing a scope, logging at `info` level
    #[must_use]
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self::with_level(label, Level::Info)
    }

    /// Start timing a scope, logging at the given level
    #[must_use]
    pub fn with_level<S: Into<String>>(label: S, level: Level) -> Self {
        Self {
            label: label.into(),
            level,
            start: Instant::now(),
            format: |label, secs| format!("{label} finished in {secs:.4}s"),
        }
    }

    const fn format(mut self, format: Formatter) -> Self {
        self.format = format;
        self
    }

    /// Seconds since the timer was started
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for LogTime {
    fn drop(&mut self) {
        let mut message = (self.format)(&self.label, self.elapsed_secs());
        if std::thread::panicking() {
            message.push_str(" (panicked)");
        }
        log!(self.level, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, Once};
    use std::time::Duration;

    use log::{Log, Metadata, Record};

    use super::{LogTime, timed};

    /// Keeps every log message so tests can look for their own lines
    struct Capture(Mutex<Vec<String>>);

    static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));
    static INIT: Once = Once::new();

    impl Log for Capture {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            self.0.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    fn captured_lines(label: &str) -> Vec<String> {
        INIT.call_once(|| {
            log::set_logger(&CAPTURE).unwrap();
            log::set_max_level(log::LevelFilter::Trace);
        });
        CAPTURE
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.starts_with(label))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_timed_passes_output_through() {
        let value = timed("answer", async { 42 }).await;
        assert_eq!(value, 42);

        let result: Result<u8, &str> = timed("failure", async { Err("nope") }).await;
        assert_eq!(result, Err("nope"));
    }

    #[test]
    fn test_log_time_measures_scope() {
        let timer = LogTime::new("sleep");
        std::thread::sleep(Duration::from_millis(20));
        assert!(timer.elapsed_secs() >= 0.02);
    }

    #[test]
    fn test_log_time_survives_unwinding() {
        captured_lines("doomed");
        let result = std::panic::catch_unwind(|| {
            let _timer = LogTime::new("doomed");
            panic!("boom");
        });
        assert!(result.is_err());

        let lines = captured_lines("doomed");
        assert_eq!(lines.len(), 1, "{lines:?}");
        assert!(lines[0].starts_with("doomed finished in "), "{lines:?}");
        assert!(lines[0].ends_with("s (panicked)"), "{lines:?}");
    }

    #[tokio::test]
    async fn test_timed_logs_duration() {
        captured_lines("answered");
        timed("answered", async {}).await;

        let lines = captured_lines("answered");
        assert_eq!(lines.len(), 1, "{lines:?}");
        assert!(lines[0].starts_with("answered took "), "{lines:?}");
        assert!(!lines[0].contains("panicked"));
    }
}
