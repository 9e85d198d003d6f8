/// Device config module.
pub mod device;
/// Dispatch config module.
pub mod dispatch;

mod base;
mod logger;

pub use base::*;
pub use logger::*;
