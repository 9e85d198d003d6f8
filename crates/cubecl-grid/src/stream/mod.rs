mod base;
mod graph;

pub use base::*;
pub use graph::*;
