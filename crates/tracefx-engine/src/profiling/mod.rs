//! Profiling counters for interception activity

pub mod stats;

pub use stats::{DispatchSnapshot, DispatchStats};
