//! Synchronization primitives for coroutines on one thread.

mod latch;
mod ticker;

pub use self::latch::Latch;
pub use self::ticker::Ticker;
