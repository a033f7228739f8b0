//! Sequences of values delivered through [Wait]s.

mod interleave;
mod queue;
mod repeater;

pub use self::interleave::{interleave, Interleave};
pub use self::queue::{FiniteStream, Stream};
pub use self::repeater::{make_streamable, Repeater, Streamable};
use crate::wait::Wait;

/// Source of values awaited one at a time.
pub trait Next {
    type Item: 'static;

    /// Returns a wait for next value.
    fn next(&self) -> Wait<Self::Item>;
}
