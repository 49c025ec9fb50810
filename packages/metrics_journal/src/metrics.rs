//! The metric types that ship with the crate.

mod cardinality;
mod code_time;
mod counter;
mod cpu;
mod latency;
mod rate;

pub use cardinality::*;
pub use code_time::*;
pub use counter::*;
pub use cpu::*;
pub use latency::*;
pub use rate::*;
