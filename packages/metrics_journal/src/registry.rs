use std::any::{Any, type_name};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::names::LOG_FILE_NAMES;
use crate::{
    AsyncWriter, Capabilities, Capability, Error, LogLine, Metric, MetricNames, Result,
    Timestamping,
};

/// Owns a set of metrics and writes their values to a journal file.
///
/// Metrics are registered with [`create_metric()`][Self::create_metric], which hands back
/// a [`MetricHandle`] for producers to update the metric through. Each metric is assigned
/// the next index in registration order; indices are dense, start at zero and are never
/// reused.
///
/// A logging pass evaluates a metric, appends a `name: value` line for it to the journal
/// and resets it. You can log one metric by index with [`log()`][Self::log], every metric
/// with [`log_all()`][Self::log_all] or only the metrics carrying a given capability with
/// [`log_tagged()`][Self::log_tagged].
///
/// All operations may be called concurrently from any number of threads. A logging pass
/// works on a snapshot of the registered metrics and processes them without holding the
/// registry lock, so metrics registered during a pass do not block it and are logged by
/// the next one.
///
/// Lines are appended by a background [`AsyncWriter`] that the registry starts when it
/// is built. Dropping the registry stops the writer and waits for every line to reach the
/// journal. Call [`close()`][Self::close] to do the same earlier while keeping the registry.
///
/// # Example
///
/// ```
/// use metrics_journal::{Capability, Counter, MetricsRegistry, RateCounter, Timestamping};
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("metrics.log");
///
/// let registry = MetricsRegistry::builder()
///     .path(&path)
///     .timestamping(Timestamping::Disabled)
///     .build()?;
///
/// let requests = registry.create_metric(Counter::new("\"Requests\""));
/// let rps = registry.create_metric(RateCounter::new());
///
/// requests.increment();
/// rps.increment();
///
/// registry.log_tagged(Capability::Server);
/// registry.log_all();
/// registry.close();
///
/// assert_eq!(
///     std::fs::read_to_string(&path)?,
///     "\"HTTPS requests RPS\": 1.00\n\"Requests\": 1\n\"HTTPS requests RPS\": 0.00\n"
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct MetricsRegistry {
    names: Arc<MetricNames>,
    timestamping: Timestamping,
    entries: RwLock<Vec<MetricEntry>>,
    writer: AsyncWriter,
}

/// A registered metric, viewed both through the metric contract and as its concrete type.
#[derive(Clone)]
struct MetricEntry {
    metric: Arc<dyn Metric>,

    // The same allocation as `metric`, kept in a form that can be downcast.
    concrete: Arc<dyn Any + Send + Sync>,

    type_name: &'static str,
    capabilities: Capabilities,
}

impl fmt::Debug for MetricEntry {
    #[cfg_attr(test, mutants::skip)] // Cosmetic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.metric.name())
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl MetricsRegistry {
    /// Creates a registry that journals to the file at `path`, with default settings.
    ///
    /// The file is created if it does not exist and appended to if it does.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SinkOpen`] if the file cannot be opened for appending and
    /// [`Error::WriterThreadSpawn`] if the writer thread cannot be started.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::builder().path(path).build()
    }

    /// Creates a builder for a registry with custom settings.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Takes ownership of `metric`, assigns it the next index and returns a handle to it.
    ///
    /// The handle keeps the metric alive and can be cloned and sent to other threads.
    pub fn create_metric<T>(&self, metric: T) -> MetricHandle<T>
    where
        T: Metric,
    {
        let metric = Arc::new(metric);

        let as_metric: Arc<dyn Metric> = Arc::<T>::clone(&metric);
        let concrete: Arc<dyn Any + Send + Sync> = Arc::<T>::clone(&metric);

        let entry = MetricEntry {
            metric: as_metric,
            concrete,
            type_name: type_name::<T>(),
            capabilities: metric.capabilities(),
        };

        let index = {
            let mut entries = self.entries.write();
            let index = entries.len();
            entries.push(entry);
            index
        };

        trace!(index, type_name = type_name::<T>(), "metric created");

        MetricHandle { index, metric }
    }

    /// The metric at `index`, as its concrete type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if no metric has been assigned `index` and
    /// [`Error::TypeMismatch`] if the metric at `index` is not a `T`.
    pub fn get_metric<T>(&self, index: usize) -> Result<Arc<T>>
    where
        T: Metric,
    {
        let MetricEntry {
            concrete,
            type_name: actual,
            ..
        } = self.entry(index)?;

        concrete.downcast::<T>().map_err(|_mismatched| Error::TypeMismatch {
            index,
            expected: type_name::<T>(),
            actual,
        })
    }

    /// The metric at `index`, through the metric contract.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if no metric has been assigned `index`.
    pub fn metric(&self, index: usize) -> Result<Arc<dyn Metric>> {
        Ok(self.entry(index)?.metric)
    }

    /// The number of registered metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no metrics have been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Evaluates, journals and resets the metric at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if no metric has been assigned `index`.
    pub fn log(&self, index: usize) -> Result<()> {
        let entry = self.entry(index)?;

        self.log_metric(entry.metric.as_ref());

        Ok(())
    }

    /// Evaluates, journals and resets every metric carrying `capability`, in index order.
    ///
    /// Every metric carries [`Capability::Default`], so passing it logs every metric.
    pub fn log_tagged(&self, capability: Capability) {
        let selected = self
            .entries
            .read()
            .iter()
            .filter(|entry| entry.capabilities.carries(capability))
            .map(|entry| Arc::clone(&entry.metric))
            .collect::<Vec<_>>();

        trace!(%capability, count = selected.len(), "logging pass");

        for metric in selected {
            self.log_metric(metric.as_ref());
        }
    }

    /// Evaluates, journals and resets every metric, in index order.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    pub fn log_all(&self) {
        self.log_tagged(Capability::Default);
    }

    /// The default-name service that metrics created for this registry can draw from.
    ///
    /// ```
    /// use metrics_journal::{CodeTime, Metric, MetricsRegistry};
    ///
    /// let dir = tempfile::tempdir()?;
    /// let registry = MetricsRegistry::new(dir.path().join("metrics.log"))?;
    ///
    /// let timer = registry.create_metric(CodeTime::with_generated_name(registry.names()));
    /// assert_eq!(timer.name(), "\"Algorithm 1\"");
    /// # registry.close();
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn names(&self) -> &MetricNames {
        &self.names
    }

    /// The path of the journal file.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    /// The writer that appends to the journal, for adding lines of your own.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    pub fn writer(&self) -> &AsyncWriter {
        &self.writer
    }

    /// Waits for every journaled line to be written and closes the journal file.
    ///
    /// Metrics remain usable afterwards, but logging passes no longer reach the journal.
    pub fn close(&self) {
        self.writer.stop();
    }

    fn entry(&self, index: usize) -> Result<MetricEntry> {
        let entries = self.entries.read();

        entries.get(index).cloned().ok_or(Error::IndexOutOfRange {
            index,
            len: entries.len(),
        })
    }

    fn log_metric(&self, metric: &dyn Metric) {
        metric.evaluate();

        let line = LogLine::metric(metric.name(), metric.value_as_string())
            .timestamped_if(self.timestamping);

        if !self.writer.write_line(&line) {
            debug!(
                name = metric.name(),
                "journal is closed, metric line dropped"
            );
        }

        metric.reset();
    }
}

/// Builder for configuring a [`MetricsRegistry`].
#[derive(Debug, Default)]
#[must_use]
pub struct RegistryBuilder {
    path: Option<PathBuf>,
    timestamping: Timestamping,
    names: Option<Arc<MetricNames>>,
}

impl RegistryBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Sets the path of the journal file.
    ///
    /// By default, the journal is written to `metrics<n>.log` in the working directory,
    /// where `n` counts up from 1 for every registry in the process that did not get an
    /// explicit path.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets whether journal lines start with a timestamp.
    ///
    /// Default is [`Timestamping::Enabled`].
    pub fn timestamping(mut self, timestamping: Timestamping) -> Self {
        self.timestamping = timestamping;
        self
    }

    /// Sets the default-name service exposed by [`MetricsRegistry::names()`].
    ///
    /// Sharing one service between registries keeps generated names unique across all of
    /// them. By default, every registry gets a fresh service.
    pub fn names(mut self, names: Arc<MetricNames>) -> Self {
        self.names = Some(names);
        self
    }

    /// Creates the registry, opening the journal file and starting its writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SinkOpen`] if the journal file cannot be opened for appending and
    /// [`Error::WriterThreadSpawn`] if the writer thread cannot be started.
    pub fn build(self) -> Result<MetricsRegistry> {
        let path = self
            .path
            .unwrap_or_else(|| PathBuf::from(LOG_FILE_NAMES.next_name()));

        let writer = AsyncWriter::new(path);
        writer.start()?;

        debug!(path = %writer.path().display(), "metrics registry created");

        Ok(MetricsRegistry {
            names: self.names.unwrap_or_default(),
            timestamping: self.timestamping,
            entries: RwLock::new(Vec::new()),
            writer,
        })
    }
}

/// Shared access to a metric owned by a [`MetricsRegistry`].
///
/// Dereferences to the metric, so its update methods can be called directly on the
/// handle. Cloning the handle is cheap and clones refer to the same metric.
#[derive(Debug)]
pub struct MetricHandle<T> {
    index: usize,
    metric: Arc<T>,
}

impl<T> MetricHandle<T> {
    /// The index the registry assigned to the metric.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The metric as a shared pointer, for holding on to it independently of the handle.
    #[must_use]
    pub fn to_arc(&self) -> Arc<T> {
        Arc::clone(&self.metric)
    }
}

impl<T> Clone for MetricHandle<T> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            metric: Arc::clone(&self.metric),
        }
    }
}

impl<T> Deref for MetricHandle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.metric
    }
}
