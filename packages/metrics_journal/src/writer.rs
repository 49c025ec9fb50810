use std::fmt::{self, Display};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write as _};
use std::panic;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::line::escape_line_breaks;
use crate::{Error, LogLine, Result, Timestamping};

/// Lifecycle state of an [`AsyncWriter`].
///
/// A writer moves through `Stopped → Starting → Running → Stopping → Stopped` and can be
/// started again after it has stopped.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum WriterState {
    /// No consumer thread exists and writes are rejected.
    Stopped,

    /// The sink is being opened and the consumer thread spawned. Writes are rejected.
    Starting,

    /// Writes are accepted and persisted by the consumer thread.
    Running,

    /// The consumer thread is draining the queue. Writes are rejected.
    Stopping,
}

impl Display for WriterState {
    #[cfg_attr(test, mutants::skip)] // Cosmetic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };

        f.write_str(name)
    }
}

/// Appends lines to a file from a background thread so that callers never wait for I/O.
///
/// [`write()`][Self::write] only enqueues the line; a single consumer thread owned by
/// the writer appends queued lines to the sink in FIFO order, flushing after every line.
/// Lines written by one thread appear in the file in the order that thread wrote them.
///
/// The queue is unbounded. Producers are never slowed down by a slow sink, at the cost
/// of memory growing without limit if the sink cannot keep up.
///
/// While the writer is not running, writes are rejected and the line is lost. Writes are
/// never retried.
///
/// # Shutdown
///
/// Call [`stop()`][Self::stop] to shut the writer down early. It returns once every line
/// accepted before the call has been written and the sink has been flushed and closed.
///
/// Dropping a running writer stops it the same way, blocking until the queue is drained.
///
/// # Example
///
/// ```
/// use metrics_journal::AsyncWriter;
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("journal.log");
///
/// let writer = AsyncWriter::new(&path);
/// writer.start()?;
///
/// assert!(writer.write("first"));
/// assert!(writer.write("second"));
///
/// writer.stop();
///
/// assert_eq!(std::fs::read_to_string(&path)?, "first\nsecond\n");
/// assert!(!writer.write("too late"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct AsyncWriter {
    path: PathBuf,

    // Held for the whole of start() and stop() so that lifecycle transitions never overlap.
    // Holds the consumer thread handle while the writer is running.
    lifecycle: Mutex<Option<JoinHandle<()>>>,

    // Taken for reading by every write, for writing only by lifecycle transitions.
    channel: RwLock<Channel>,
}

#[derive(Debug)]
struct Channel {
    state: WriterState,

    // Present only in the `Running` state. Dropping it is what tells the consumer
    // to finish draining and exit.
    sender: Option<Sender<String>>,
}

impl AsyncWriter {
    /// Creates a stopped writer that will append to the file at `path` once started.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lifecycle: Mutex::new(None),
            channel: RwLock::new(Channel {
                state: WriterState::Stopped,
                sender: None,
            }),
        }
    }

    /// The path of the sink file.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WriterState {
        self.channel.read().state
    }

    /// Whether writes are currently accepted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == WriterState::Running
    }

    /// Opens the sink for appending and starts the consumer thread.
    ///
    /// Does nothing if the writer is already running. If a [`stop()`][Self::stop] is in
    /// progress on another thread, waits for it to complete and then starts again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SinkOpen`] if the sink cannot be opened or created, and
    /// [`Error::WriterThreadSpawn`] if the operating system refuses to start the consumer
    /// thread. The writer remains stopped in both cases.
    pub fn start(&self) -> Result<()> {
        let mut consumer = self.lifecycle.lock();

        if consumer.is_some() {
            return Ok(());
        }

        self.set_state(WriterState::Starting);

        let sink = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(source) => {
                self.set_state(WriterState::Stopped);

                return Err(Error::SinkOpen {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let (sender, receiver) = channel::unbounded();

        let path = self.path.clone();
        let spawned = thread::Builder::new()
            .name("metrics-journal-writer".to_string())
            .spawn(move || consume(&receiver, BufWriter::new(sink), &path));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(source) => {
                self.set_state(WriterState::Stopped);

                return Err(Error::WriterThreadSpawn { source });
            }
        };

        *consumer = Some(handle);

        *self.channel.write() = Channel {
            state: WriterState::Running,
            sender: Some(sender),
        };

        debug!(path = %self.path.display(), "log writer started");

        Ok(())
    }

    /// Enqueues `line` for appending to the sink, followed by a line terminator.
    ///
    /// Line breaks inside `line` are written as the escapes `\n` and `\r`, so every
    /// accepted call produces exactly one line in the file.
    ///
    /// Returns `true` if the line was accepted, in which case it is guaranteed to be
    /// written before a subsequent [`stop()`][Self::stop] returns. Returns `false` without
    /// doing anything if the writer is not running.
    ///
    /// Never waits for I/O.
    pub fn write(&self, line: impl Into<String>) -> bool {
        let channel = self.channel.read();

        match &channel.sender {
            // The consumer only disconnects after the sender is dropped, so the send
            // cannot fail while we hold it.
            Some(sender) if channel.state == WriterState::Running => {
                let line: String = line.into();
                let line = if line.contains(['\n', '\r']) {
                    escape_line_breaks(&line).into_owned()
                } else {
                    line
                };

                sender.send(line).is_ok()
            }
            _ => false,
        }
    }

    /// Enqueues a rendered [`LogLine`].
    ///
    /// Same semantics as [`write()`][Self::write].
    pub fn write_line(&self, line: &LogLine) -> bool {
        self.write(line.to_string())
    }

    /// Enqueues a `name: value` line, timestamped according to `timestamping`.
    ///
    /// Same semantics as [`write()`][Self::write].
    pub fn write_metric(&self, name: &str, value: &str, timestamping: Timestamping) -> bool {
        self.write_line(&LogLine::metric(name, value).timestamped_if(timestamping))
    }

    /// Enqueues free-form text prefixed with the current time.
    ///
    /// Same semantics as [`write()`][Self::write].
    pub fn write_timestamped(&self, text: &str) -> bool {
        self.write_line(&LogLine::plain(text).timestamped())
    }

    /// Stops accepting writes, waits for every accepted line to be written and closes
    /// the sink.
    ///
    /// Does nothing if the writer is not running.
    ///
    /// # Panics
    ///
    /// Resumes the panic of the consumer thread if it panicked. This is not expected to
    /// happen because sink errors are logged and do not terminate the consumer.
    pub fn stop(&self) {
        let mut consumer = self.lifecycle.lock();

        let Some(handle) = consumer.take() else {
            return;
        };

        let sender = {
            let mut channel = self.channel.write();
            channel.state = WriterState::Stopping;
            channel.sender.take()
        };

        // Disconnects the channel. The consumer exits once the queue is empty.
        drop(sender);

        if let Err(payload) = handle.join() {
            panic::resume_unwind(payload);
        }

        self.set_state(WriterState::Stopped);

        debug!(path = %self.path.display(), "log writer stopped");
    }

    fn set_state(&self, state: WriterState) {
        self.channel.write().state = state;
    }
}

impl Drop for AsyncWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn consume(receiver: &Receiver<String>, mut sink: BufWriter<File>, path: &Path) {
    trace!(path = %path.display(), "log writer consumer started");

    // Yields until every sender is gone and the queue is empty.
    for line in receiver {
        let written = writeln!(sink, "{line}").and_then(|()| sink.flush());

        match written {
            Ok(()) => trace!(path = %path.display(), "log line written"),
            Err(error) => warn!(
                path = %path.display(),
                %error,
                "failed to write log line, the line is lost"
            ),
        }
    }

    if let Err(error) = sink.flush() {
        warn!(path = %path.display(), %error, "failed to flush log sink on shutdown");
    }

    trace!(path = %path.display(), "log writer consumer exiting");
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::indexing_slicing, reason = "panic is fine in tests")]

    use std::fs;
    use std::sync::Arc;

    use static_assertions::assert_impl_all;
    use testing::with_watchdog;

    use super::*;

    assert_impl_all!(AsyncWriter: Send, Sync);

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn line_breaks_do_not_split_lines() {
        with_watchdog(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("breaks.log");

            let writer = AsyncWriter::new(&path);
            writer.start().unwrap();
            assert!(writer.write("a\nb"));
            assert!(writer.write("c\r\nd"));
            writer.stop();

            assert_eq!(read_lines(&path), ["a\\nb", "c\\r\\nd"]);
        });
    }

    #[test]
    fn new_writer_is_stopped() {
        let writer = AsyncWriter::new("unused.log");

        assert_eq!(writer.state(), WriterState::Stopped);
        assert!(!writer.is_running());
    }

    #[test]
    fn sequential_writes_keep_order() {
        with_watchdog(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("order.log");

            let writer = AsyncWriter::new(&path);
            writer.start().unwrap();

            assert!(writer.write("A"));
            assert!(writer.write("B"));
            assert!(writer.write("C"));

            writer.stop();

            assert_eq!(read_lines(&path), ["A", "B", "C"]);
        });
    }

    #[cfg_attr(miri, ignore)] // Too slow under Miri.
    #[test]
    fn stop_drains_every_accepted_line() {
        with_watchdog(|| {
            const LINES: usize = 10_000;

            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("drain.log");

            let writer = AsyncWriter::new(&path);
            writer.start().unwrap();

            let accepted = (0..LINES)
                .filter(|i| writer.write(format!("line {i}")))
                .count();

            writer.stop();

            let lines = read_lines(&path);
            assert_eq!(accepted, LINES);
            assert_eq!(lines.len(), accepted);
            assert_eq!(lines.first().map(String::as_str), Some("line 0"));
            assert_eq!(lines.last().map(String::as_str), Some("line 9999"));
        });
    }

    #[test]
    fn write_when_stopped_is_rejected() {
        with_watchdog(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("stopped.log");

            let writer = AsyncWriter::new(&path);
            assert!(!writer.write("never started"));

            writer.start().unwrap();
            writer.stop();

            assert!(!writer.write("after stop"));
            assert!(read_lines(&path).is_empty());
        });
    }

    #[test]
    fn start_is_idempotent() {
        with_watchdog(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("idempotent.log");

            let writer = AsyncWriter::new(&path);
            writer.start().unwrap();
            writer.start().unwrap();
            assert!(writer.is_running());

            assert!(writer.write("once"));
            writer.stop();

            assert_eq!(read_lines(&path), ["once"]);
        });
    }

    #[test]
    fn stop_is_idempotent() {
        with_watchdog(|| {
            let dir = tempfile::tempdir().unwrap();
            let writer = AsyncWriter::new(dir.path().join("stop.log"));

            writer.stop();
            writer.start().unwrap();
            writer.stop();
            writer.stop();

            assert_eq!(writer.state(), WriterState::Stopped);
        });
    }

    #[test]
    fn restart_appends_to_existing_file() {
        with_watchdog(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("restart.log");
            fs::write(&path, "existing\n").unwrap();

            let writer = AsyncWriter::new(&path);

            writer.start().unwrap();
            assert!(writer.write("first run"));
            writer.stop();

            writer.start().unwrap();
            assert!(writer.write("second run"));
            writer.stop();

            assert_eq!(read_lines(&path), ["existing", "first run", "second run"]);
        });
    }

    #[test]
    fn unopenable_sink_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-directory").join("journal.log");

        let writer = AsyncWriter::new(&path);
        let result = writer.start();

        assert!(matches!(result, Err(Error::SinkOpen { .. })));
        assert_eq!(writer.state(), WriterState::Stopped);
        assert!(!writer.write("lost"));
    }

    #[test]
    fn helpers_render_lines() {
        with_watchdog(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("helpers.log");

            let writer = AsyncWriter::new(&path);
            writer.start().unwrap();

            assert!(writer.write_metric("\"Count\"", "7", Timestamping::Disabled));
            assert!(writer.write_metric("\"Count\"", "8", Timestamping::Enabled));
            assert!(writer.write_timestamped("note"));
            assert!(writer.write_line(&LogLine::plain("plain")));

            writer.stop();

            let lines = read_lines(&path);
            assert_eq!(lines.len(), 4);
            assert_eq!(lines[0], "\"Count\": 7");
            assert!(lines[1].starts_with('['));
            assert!(lines[1].ends_with("] \"Count\": 8"));
            assert!(lines[2].ends_with("] note"));
            assert_eq!(lines[3], "plain");
        });
    }

    #[cfg_attr(miri, ignore)] // Too slow under Miri.
    #[test]
    fn concurrent_writers_keep_per_thread_order() {
        with_watchdog(|| {
            const THREADS: usize = 4;
            const LINES_PER_THREAD: usize = 500;

            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("concurrent.log");

            let writer = Arc::new(AsyncWriter::new(&path));
            writer.start().unwrap();

            let handles = (0..THREADS)
                .map(|t| {
                    let writer = Arc::clone(&writer);
                    thread::spawn(move || {
                        for i in 0..LINES_PER_THREAD {
                            assert!(writer.write(format!("{t} {i}")));
                        }
                    })
                })
                .collect::<Vec<_>>();

            for handle in handles {
                handle.join().unwrap();
            }

            writer.stop();

            let lines = read_lines(&path);
            assert_eq!(lines.len(), THREADS * LINES_PER_THREAD);

            let mut next_expected = [0_usize; THREADS];
            for line in lines {
                let (thread_index, line_index) = line.split_once(' ').unwrap();
                let thread_index: usize = thread_index.parse().unwrap();
                let line_index: usize = line_index.parse().unwrap();

                assert_eq!(line_index, next_expected[thread_index]);
                next_expected[thread_index] += 1;
            }
        });
    }

    #[test]
    fn dropping_running_writer_drains_before_returning() {
        with_watchdog(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("dropped.log");

            let writer = AsyncWriter::new(&path);
            writer.start().unwrap();

            for i in 0..1_000 {
                assert!(writer.write(format!("line {i}")));
            }

            drop(writer);

            let lines = read_lines(&path);
            assert_eq!(lines.len(), 1_000);
            assert_eq!(lines[999], "line 999");
        });
    }

    #[test]
    fn dropping_stopped_writer_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.log");

        drop(AsyncWriter::new(&path));

        assert!(!path.exists());
    }
}
