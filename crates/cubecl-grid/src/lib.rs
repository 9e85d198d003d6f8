#![warn(missing_docs)]

//! CubeCL grid crate: the device substrate used by device-wide dispatches.
//!
//! It provides the collaborators a dispatch needs without knowing anything about the
//! algorithm being dispatched: device memory allocation, architecture queries, execution
//! streams with explicit happens-after edges, and a CPU reference device that executes
//! worker groups on host threads.
//!
//! The crate always links the standard library, the CPU device runs its groups on host
//! threads. The `std` feature (enabled by default) adds `cubecl.toml` discovery and toml
//! parsing to [config::GlobalConfig]; without it the configuration only comes from
//! defaults and environment variables.

#[macro_use]
extern crate derive_new;

/// Identifier types.
pub mod id;

/// Error types shared by every device implementation.
pub mod error;

/// Device memory allocation.
pub mod memory_management;

/// Architecture and occupancy queries.
pub mod arch;

/// Execution streams and the launch task graph.
pub mod stream;

/// CPU reference device.
pub mod cpu;

/// Global configuration and loggers.
pub mod config;

pub use arch::*;
pub use error::*;
