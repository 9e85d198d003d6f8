mod base;
mod guard;

pub use base::*;
pub use guard::*;
