//! CubeCL dispatch crate: device-wide tile dispatch of reduction-style primitives.
//!
//! A dispatch selects an [execution policy](ExecutionPolicy) for the architecture of the
//! device, splits its input in tiles, assigns the tiles to worker groups statically or
//! through a shared [queue](grid::GridQueue), and combines the results of the groups either
//! directly or through privatized slots reduced by an aggregation launch. Histograms and
//! prefix scans are built on top of it.

#[macro_use]
extern crate derive_new;

mod aggregate;
mod dispatch;
mod error;
mod init;
mod policy;
mod status;

/// Combine operators.
pub mod instructions;

/// Tile distribution between worker groups.
pub mod grid;

/// The per-tile worker interface.
pub mod tile;

/// Histogram entry points.
pub mod histogram;

/// Prefix scan entry points.
pub mod scan;

pub use aggregate::*;
pub use dispatch::*;
pub use error::*;
pub use init::*;
pub use instructions::*;
pub use policy::*;
pub use status::*;

pub use histogram::{
    histogram_even, histogram_range, multi_histogram_even, multi_histogram_range,
};
pub use scan::{exclusive_scan, inclusive_scan};
