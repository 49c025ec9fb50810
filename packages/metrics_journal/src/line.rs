use std::borrow::Cow;
use std::fmt::{self, Display};

use chrono::{Local, NaiveDateTime};

/// The layout of the timestamp prefix: local time with millisecond precision.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Whether a line written to the journal starts with a timestamp.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Timestamping {
    /// Lines start with `[YYYY-MM-DD HH:MM:SS.mmm] `, taken in local time when the line
    /// is rendered.
    #[default]
    Enabled,

    /// Lines contain only the payload.
    Disabled,
}

/// One line of the journal, rendered through [`Display`].
///
/// A line is either a metric observation rendered as `name: value` or free-form text,
/// optionally prefixed with a timestamp in square brackets:
///
/// ```text
/// [2025-03-14 09:26:53.589] "CPU Usage": 12.50%
/// ```
///
/// The rendered text never contains a line break. Line breaks in names, values or text are
/// rendered as the escapes `\n` and `\r`, and the writer appends the terminator.
///
/// # Example
///
/// ```
/// use metrics_journal::LogLine;
///
/// let line = LogLine::metric("\"Requests\"", "42");
/// assert_eq!(line.to_string(), "\"Requests\": 42");
///
/// let line = LogLine::plain("journal opened").timestamped();
/// assert!(line.to_string().starts_with('['));
/// assert!(line.to_string().ends_with("] journal opened"));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogLine {
    timestamp: Option<NaiveDateTime>,
    payload: Payload,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Payload {
    Metric { name: String, value: String },
    Plain(String),
}

impl LogLine {
    /// A line reporting the value of a metric, rendered as `name: value`.
    #[must_use]
    pub fn metric(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            payload: Payload::Metric {
                name: name.into(),
                value: value.into(),
            },
        }
    }

    /// A line of free-form text.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            payload: Payload::Plain(text.into()),
        }
    }

    /// Prefixes the line with the current local time.
    #[must_use]
    pub fn timestamped(self) -> Self {
        self.with_timestamp(Local::now().naive_local())
    }

    /// Prefixes the line with the given time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Applies the timestamping mode: timestamps the line if `Enabled`, leaves it as is
    /// otherwise.
    #[must_use]
    pub fn timestamped_if(self, timestamping: Timestamping) -> Self {
        match timestamping {
            Timestamping::Enabled => self.timestamped(),
            Timestamping::Disabled => self,
        }
    }

    /// Whether the line starts with a timestamp.
    #[must_use]
    pub fn is_timestamped(&self) -> bool {
        self.timestamp.is_some()
    }
}

impl Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(timestamp) = self.timestamp {
            write!(f, "[{}] ", timestamp.format(TIMESTAMP_FORMAT))?;
        }

        match &self.payload {
            Payload::Metric { name, value } => write!(
                f,
                "{}: {}",
                escape_line_breaks(name),
                escape_line_breaks(value)
            ),
            Payload::Plain(text) => f.write_str(&escape_line_breaks(text)),
        }
    }
}

/// Replaces `\n` and `\r` with their escapes so that `text` occupies one journal line.
pub(crate) fn escape_line_breaks(text: &str) -> Cow<'_, str> {
    if text.contains(['\n', '\r']) {
        Cow::Owned(text.replace('\n', "\\n").replace('\r', "\\r"))
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::indexing_slicing, reason = "panic is fine in tests")]

    use chrono::NaiveDate;

    use super::*;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(3, 4, 5, 6)
            .unwrap()
    }

    #[test]
    fn metric_line_without_timestamp() {
        let line = LogLine::metric("\"CPU\"", "1.50");

        assert_eq!(line.to_string(), "\"CPU\": 1.50");
        assert!(!line.is_timestamped());
    }

    #[test]
    fn metric_line_with_timestamp() {
        let line = LogLine::metric("name", "value").with_timestamp(fixed_time());

        assert_eq!(line.to_string(), "[2024-01-02 03:04:05.006] name: value");
    }

    #[test]
    fn plain_line_with_timestamp() {
        let line = LogLine::plain("hello").with_timestamp(fixed_time());

        assert_eq!(line.to_string(), "[2024-01-02 03:04:05.006] hello");
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let line = LogLine::plain("x").timestamped();
        let rendered = line.to_string();

        // "[YYYY-MM-DD HH:MM:SS.mmm] x"
        assert_eq!(rendered.len(), 1 + 23 + 2 + 1);
        assert_eq!(rendered.as_bytes()[20], b'.');
        assert_eq!(rendered.as_bytes()[24], b']');
    }

    #[test]
    fn timestamped_if_follows_mode() {
        assert!(
            LogLine::plain("x")
                .timestamped_if(Timestamping::Enabled)
                .is_timestamped()
        );
        assert!(
            !LogLine::plain("x")
                .timestamped_if(Timestamping::Disabled)
                .is_timestamped()
        );
    }

    #[test]
    fn line_breaks_are_escaped() {
        let line = LogLine::metric("multi\nline", "a\r\nb");
        assert_eq!(line.to_string(), "multi\\nline: a\\r\\nb");

        let line = LogLine::plain("one\ntwo");
        assert_eq!(line.to_string(), "one\\ntwo");
    }

    #[test]
    fn text_without_line_breaks_is_borrowed() {
        assert!(matches!(escape_line_breaks("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn default_timestamping_is_enabled() {
        assert_eq!(Timestamping::default(), Timestamping::Enabled);
    }
}
