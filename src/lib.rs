#![allow(clippy::needless_doctest_main)]

//! # Single-threaded cooperative coroutines with cancellable waits
//! `coweave` multiplexes lightweight coroutines on one thread. Results flow through [Wait]s,
//! move-only handles fulfilled by [WaitPromise]s. Dropping a pending [Wait] cancels whatever
//! computes it, and cancellation cascades through nested coroutines the way stack unwinding
//! does.
//!
//! ## Usage
//! Construct a [runtime::Scheduler], [runtime::Scheduler::enter] it, and call
//! [runtime::Scheduler::run_to_quiescence] whenever promises have been fulfilled, e.g. once per
//! tick of host loop.
//!
//! ### Wait
//! * Use [WaitPromise::new] and [WaitPromise::wait] to bridge external events into coroutines.
//! * Use [coroutine::spawn] to run an `async` body as coroutine. It runs eagerly until its first
//!   suspension and returns a [Wait] for its result.
//! * Return `Err` from a coroutine body, usually through `?`, to fail its [Wait] with
//!   [Exception].
//!
//! ### Combinators
//! * Use [combinator::any], [combinator::all], [combinator::first] and friends to compose waits.
//! * Use [sync::Latch] and [sync::Ticker] to release many coroutines at once.
//! * Use [stream::Stream], [stream::FiniteStream] and [stream::interleave] to pass sequences of
//!   values.
//!
//! ## Example
//! ```rust
//! use coweave::combinator::{first, OneOf2};
//! use coweave::runtime::Scheduler;
//! use coweave::{coroutine, Exception, WaitPromise};
//!
//! fn main() {
//!     let scheduler = Scheduler::new();
//!     let _scope = scheduler.enter();
//!
//!     let input = WaitPromise::<i32>::new();
//!     let timeout = WaitPromise::<()>::new();
//!
//!     let pending = input.wait();
//!     let doubled = coroutine::spawn(async move { Ok::<_, Exception>(pending.await? * 2) });
//!     let raced = first((doubled, timeout.wait()));
//!
//!     input.set_value(21);
//!     scheduler.run_to_quiescence();
//!     assert_eq!(*raced.get(), OneOf2::A(42));
//! }
//! ```

pub mod combinator;
pub mod coroutine;
mod error;
pub mod runtime;
pub mod stream;
pub mod sync;
mod wait;

#[cfg(not(test))]
pub use coweave_macros::main;
pub use coweave_macros::test;

pub use self::error::{Exception, Failure};
pub use self::wait::{empty_wait, make_wait, Status, Wait, WaitPromise};
