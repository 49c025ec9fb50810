//! Platform abstraction layer for raw processor time counters.
//!
//! The real implementation reads the operating system's cumulative processor time
//! counters. Tests substitute a mock so that metric arithmetic can be verified against
//! known counter values.

mod abstractions;
mod facade;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub(crate) use linux::*;

#[cfg(not(target_os = "linux"))]
mod fallback;
#[cfg(not(target_os = "linux"))]
pub(crate) use fallback::*;

#[cfg(test)]
pub(crate) use abstractions::MockPlatform;
pub(crate) use abstractions::Platform;
pub(crate) use facade::PlatformFacade;
