use std::fmt::{self, Display};

/// A marker used to classify metrics so that a subset of them can be logged in one pass.
///
/// Capabilities form a single-rooted hierarchy: every metric carries [`Capability::Default`]
/// and may additionally carry any number of the more specific capabilities. Selecting
/// metrics by [`Capability::Default`] therefore selects every metric.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Capability {
    /// The root capability, carried by every metric.
    Default,

    /// Measurements of the machine the process runs on (processor load, latency).
    Computer,

    /// Measurements of a serving workload (request rates).
    Server,

    /// Measurements of algorithm execution (timed code sections).
    Algo,
}

impl Capability {
    const fn bit(self) -> u8 {
        match self {
            Self::Default => 0b0001,
            Self::Computer => 0b0010,
            Self::Server => 0b0100,
            Self::Algo => 0b1000,
        }
    }
}

impl Display for Capability {
    #[cfg_attr(test, mutants::skip)] // Cosmetic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::Computer => "computer",
            Self::Server => "server",
            Self::Algo => "algo",
        };

        f.write_str(name)
    }
}

/// The set of capabilities carried by one metric.
///
/// The set is fixed when the metric is constructed. It always contains
/// [`Capability::Default`], there is no way to construct a set without it.
///
/// # Example
///
/// ```
/// use metrics_journal::{Capabilities, Capability};
///
/// let capabilities = Capabilities::with(Capability::Server);
///
/// assert!(capabilities.carries(Capability::Server));
/// assert!(capabilities.carries(Capability::Default));
/// assert!(!capabilities.carries(Capability::Computer));
/// ```
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Capabilities {
    bits: u8,
}

impl Capabilities {
    /// A set that contains only the root capability.
    pub const DEFAULT: Self = Self {
        bits: Capability::Default.bit(),
    };

    /// Creates a set with the root capability plus `capability`.
    #[must_use]
    pub const fn with(capability: Capability) -> Self {
        Self::DEFAULT.and(capability)
    }

    /// Returns a copy of the set that also contains `capability`.
    #[must_use]
    pub const fn and(self, capability: Capability) -> Self {
        Self {
            bits: self.bits | capability.bit(),
        }
    }

    /// Whether the set contains `capability`.
    #[must_use]
    pub const fn carries(self, capability: Capability) -> bool {
        self.bits & capability.bit() != 0
    }

    /// Iterates over the capabilities in the set, root first.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        [
            Capability::Default,
            Capability::Computer,
            Capability::Server,
            Capability::Algo,
        ]
        .into_iter()
        .filter(move |c| self.carries(*c))
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
