mod allocator;
mod device;
mod fault;
mod scheduler;
mod stream;

pub use allocator::*;
pub use device::*;
pub use fault::*;
pub use scheduler::*;
pub use stream::*;
