#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing and examples in metrics_journal.

use std::{env, fs, panic};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Length of the `[YYYY-MM-DD HH:MM:SS.mmm] ` prefix of a timestamped journal line.
const TIMESTAMP_PREFIX_LEN: usize = 26;

/// Runs a test with a timeout to prevent infinite hangs.
///
/// This function wraps a test closure with a timeout mechanism. If the test
/// takes longer than the timeout to complete, the process will be terminated
/// to prevent CI/build systems from hanging.
///
/// The timeout is 10 seconds under normal conditions and 60 seconds under
/// Miri, where thread synchronization primitives are significantly slower.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog
/// is disabled and the test function is executed directly. This allows mutation
/// testing to properly detect hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode).
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// with_watchdog(|| {
///     // Your test code here
///     assert_eq!(2 + 2, 4);
/// });
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    // Check if we are running under mutation testing.
    if env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        // Under mutation testing, disable the watchdog to allow hanging mutations.
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    // Run the test in a separate thread
    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // Send the result back - if this fails, the receiver has timed out
        drop(tx.send(result));
    });

    // Miri is dramatically slower for thread synchronization, so we use a
    // longer timeout to avoid false positives while still catching real hangs.
    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    // Wait for either the test to complete or timeout.
    match rx.recv_timeout(timeout) {
        Ok(result) => {
            // Test completed successfully, join the thread to clean up
            test_handle.join().expect("Test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            // Test timed out - this indicates the test is hanging
            panic!("Test exceeded 10-second timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            // Thread panicked, join it to get the panic
            match test_handle.join() {
                Ok(()) => panic!("Test thread disconnected unexpectedly"),
                Err(e) => panic::resume_unwind(e),
            }
        }
    }
}

/// Reads a journal file and returns its lines without terminators.
///
/// # Panics
///
/// Panics if the file cannot be read.
#[must_use]
pub fn read_journal(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read journal {}: {e}", path.display()))
        .lines()
        .map(str::to_string)
        .collect()
}

/// Returns the payload of a journal line that starts with a well-formed
/// `[YYYY-MM-DD HH:MM:SS.mmm] ` timestamp, or `None` if the line has no such prefix.
#[must_use]
pub fn strip_timestamp(line: &str) -> Option<&str> {
    let prefix = line.get(..TIMESTAMP_PREFIX_LEN)?;

    let well_formed = prefix.char_indices().all(|(i, c)| match i {
        0 => c == '[',
        5 | 8 => c == '-',
        11 => c == ' ',
        14 | 17 => c == ':',
        20 => c == '.',
        24 => c == ']',
        25 => c == ' ',
        _ => c.is_ascii_digit(),
    });

    if well_formed {
        line.get(TIMESTAMP_PREFIX_LEN..)
    } else {
        None
    }
}

/// Reads a journal file whose lines are all timestamped and returns the payloads.
///
/// # Panics
///
/// Panics if the file cannot be read or a line lacks a well-formed timestamp.
#[must_use]
pub fn read_journal_payloads(path: &Path) -> Vec<String> {
    read_journal(path)
        .into_iter()
        .map(|line| match strip_timestamp(&line) {
            Some(payload) => payload.to_string(),
            None => panic!("journal line is not timestamped: {line}"),
        })
        .collect()
}
