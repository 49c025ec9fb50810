#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! In-process metrics that are periodically written to a journal file.
//!
//! Application code updates metrics from any number of threads. A [`MetricsRegistry`]
//! owns the metrics and, whenever you ask it to, evaluates each one, appends a
//! `name: value` line to the journal and resets the metric for the next interval.
//! Journal lines are written by a background thread, so neither producers nor the
//! thread driving the logging pass ever wait for file I/O.
//!
//! # Metrics
//!
//! * [`Counter`] - a monotonic count of occurrences.
//! * [`RateCounter`] - the number of occurrences between two logging passes.
//! * [`PercentileLatency`] - P90/P95/P99/P99.9 of observed durations.
//! * [`CpuUsage`] and [`CpuLoad`] - processor utilization of the machine.
//! * [`CodeTime`] - a stopwatch for a section of code.
//! * [`Cardinality`] - the number of distinct values observed and the most frequent ones.
//!
//! You can add your own by implementing the [`Metric`] trait.
//!
//! # Capabilities
//!
//! Every metric declares a set of [`Capabilities`], which lets a registry log a subset of
//! its metrics in one pass via [`MetricsRegistry::log_tagged()`]. Every metric carries
//! [`Capability::Default`], so logging by that capability logs everything.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use metrics_journal::{Capability, Counter, MetricsRegistry, PercentileLatency};
//!
//! let dir = tempfile::tempdir()?;
//! let registry = MetricsRegistry::new(dir.path().join("metrics.log"))?;
//!
//! let requests = registry.create_metric(Counter::new("\"Requests\""));
//! let latency = registry.create_metric(PercentileLatency::new());
//!
//! // Producers update metrics through their handles.
//! requests.increment();
//! latency.observe(Duration::from_micros(350));
//!
//! // Some periodic task logs them.
//! registry.log_tagged(Capability::Computer);
//! registry.log_all();
//!
//! // Wait for all lines to reach the file.
//! registry.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The journal then contains lines like these:
//!
//! ```text
//! [2025-03-14 09:26:53.589] "Percentile Latency": P90: 350207ns, P95: 350207ns, P99: 350207ns, P999: 350207ns
//! [2025-03-14 09:26:53.589] "Requests": 1
//! [2025-03-14 09:26:53.589] "Percentile Latency": P90: 0ns, P95: 0ns, P99: 0ns, P999: 0ns
//! ```
//!
//! # Shutdown
//!
//! Dropping a [`MetricsRegistry`] (or an [`AsyncWriter`] used on its own) waits until every
//! line accepted so far is in the file. [`MetricsRegistry::close()`] and
//! [`AsyncWriter::stop()`] do the same while keeping the object around; later logging
//! passes still evaluate and reset metrics but no longer reach the journal.
//!
//! # Diagnostics
//!
//! The package emits `tracing` events for lifecycle transitions and journal I/O failures.
//! It never installs a subscriber itself.

mod capability;
mod cpu_times;
mod error;
mod line;
mod metric;
mod metrics;
mod names;
mod registry;
mod writer;

pub(crate) mod pal;

pub use capability::*;
pub use cpu_times::*;
pub use error::*;
pub use line::*;
pub use metric::*;
pub use metrics::*;
pub use names::*;
pub use registry::*;
pub use writer::*;
