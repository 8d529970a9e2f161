//! Tracing and logging setup shared by every binary.

pub mod tracing;

pub use crate::tracing::{LogConfig, init, init_with};
