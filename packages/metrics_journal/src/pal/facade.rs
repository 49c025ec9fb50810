use std::fmt::{self, Debug};
#[cfg(test)]
use std::sync::Arc;

use crate::CpuTimes;
#[cfg(test)]
use crate::pal::MockPlatform;
use crate::pal::{BUILD_TARGET_PLATFORM, BuildTargetPlatform, Platform};

/// Enum to hide the different platform implementations behind a single wrapper type.
#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Real(&'static BuildTargetPlatform),

    #[cfg(test)]
    Mock(Arc<MockPlatform>),
}

impl PlatformFacade {
    pub(crate) const fn real() -> Self {
        Self::Real(&BUILD_TARGET_PLATFORM)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockPlatform) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl Platform for PlatformFacade {
    fn cpu_times(&self) -> Option<CpuTimes> {
        match self {
            Self::Real(p) => p.cpu_times(),
            #[cfg(test)]
            Self::Mock(p) => p.cpu_times(),
        }
    }

    fn processor_count(&self) -> usize {
        match self {
            Self::Real(p) => p.processor_count(),
            #[cfg(test)]
            Self::Mock(p) => p.processor_count(),
        }
    }
}

impl Debug for PlatformFacade {
    #[cfg_attr(test, mutants::skip)] // Cosmetic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real(p) => p.fmt(f),
            #[cfg(test)]
            Self::Mock(p) => p.fmt(f),
        }
    }
}
