//! Combinators composing [Wait]s.
//!
//! Combinators spawning coroutines require a scheduler, see [coroutine::spawn].

mod first;

use std::error::Error;

pub use self::first::{first, First, OneOf2, OneOf3, OneOf4, OneOf5, OneOf6};
use crate::coroutine;
use crate::error::Exception;
use crate::wait::{disjunctive, Wait, WaitPromise};

/// Heterogeneous collection of waits whose values are of no interest.
pub trait WaitSet {
    fn into_units(self) -> Vec<Wait<()>>;
}

impl<T: 'static> WaitSet for Vec<Wait<T>> {
    fn into_units(self) -> Vec<Wait<()>> {
        self.into_iter().map(Wait::discard).collect()
    }
}

macro_rules! wait_set_tuple {
    ($($T:ident $w:ident),+) => {
        impl<$($T: 'static),+> WaitSet for ($(Wait<$T>,)+) {
            fn into_units(self) -> Vec<Wait<()>> {
                let ($($w,)+) = self;
                vec![$($w.discard()),+]
            }
        }
    };
}

wait_set_tuple!(A a);
wait_set_tuple!(A a, B b);
wait_set_tuple!(A a, B b, C c);
wait_set_tuple!(A a, B b, C c, D d);
wait_set_tuple!(A a, B b, C c, D d, E e);
wait_set_tuple!(A a, B b, C c, D d, E e, F f);

/// Resolves as soon as any input resolves.
///
/// Exception of the first resolved input fails the result. Inputs are dropped once the result
/// resolves, so those still pending are cancelled. An empty set never resolves.
pub fn any<S: WaitSet>(waits: S) -> Wait<()> {
    let mut waits = waits.into_units();
    let promise = WaitPromise::new();
    for wait in waits.iter_mut() {
        disjunctive(wait, &promise, |_| ());
    }
    let mut result = promise.wait();
    result.attach(waits);
    result.release_on_resolve();
    result
}

/// Resolves after every input resolves.
///
/// Inputs are awaited in order, the first exception encountered fails the result and cancels
/// inputs not yet awaited.
pub fn all<S: WaitSet>(waits: S) -> Wait<()> {
    let waits = waits.into_units();
    coroutine::spawn(async move {
        for wait in waits {
            wait.await?;
        }
        Ok::<_, Exception>(())
    })
}

/// Resolves with result of `main` while keeping `bg` running.
///
/// `bg` is cancelled together with the returned wait and its outcome is ignored.
pub fn background<T: 'static, U: 'static>(main: Wait<T>, bg: Wait<U>) -> Wait<T> {
    let composite = coroutine::spawn(async move { main.await });
    composite.attach(bg);
    composite
}

/// Resolves to `Some(value)` if `wait` resolves first, or `None` if `canceller` does. The loser
/// is cancelled.
pub fn with_cancel<T: 'static, U: 'static>(wait: Wait<T>, canceller: Wait<U>) -> Wait<Option<T>> {
    fmap(
        |outcome| match outcome {
            OneOf2::A(value) => Some(value),
            OneOf2::B(_) => None,
        },
        first((wait, canceller)),
    )
}

/// Maps eventual value of `wait` through `f`.
pub fn fmap<T, U, F>(f: F, wait: Wait<T>) -> Wait<U>
where
    T: 'static,
    U: 'static,
    F: FnOnce(T) -> U + 'static,
{
    coroutine::spawn(async move { Ok::<_, Exception>(f(wait.await?)) })
}

/// Runs wait produced by `factory` and catches exception of type `E` raised by it, before or
/// after suspension.
///
/// Caught error is handed to `catcher` and the result resolves to `None`. Other exceptions
/// propagate.
pub fn try_<E, T, F, C>(factory: F, catcher: C) -> Wait<Option<T>>
where
    E: Error + 'static,
    T: 'static,
    F: FnOnce() -> Wait<T> + 'static,
    C: FnOnce(&E) + 'static,
{
    coroutine::spawn(async move {
        match factory().await {
            Ok(value) => Ok(Some(value)),
            Err(err) => match err.downcast_ref::<E>() {
                Some(caught) => {
                    catcher(caught);
                    Ok(None)
                },
                None => Err(err),
            },
        }
    })
}

/// Value together with whether awaiting it suspended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultWithSuspend<T> {
    pub result: T,
    pub suspended: bool,
}

/// Reports whether awaiting `wait` suspends.
pub fn detect_suspend<T: 'static>(wait: Wait<T>) -> Wait<ResultWithSuspend<T>> {
    let suspended = !wait.ready();
    coroutine::spawn(async move {
        let result = wait.await?;
        Ok::<_, Exception>(ResultWithSuspend { result, suspended })
    })
}

/// Awaits waits produced by `factory` one after another, forever.
///
/// Returned wait resolves only through exception. Waits produced should eventually suspend,
/// otherwise the loop never yields.
pub fn repeat<T, F>(mut factory: F) -> Wait<()>
where
    T: 'static,
    F: FnMut() -> Wait<T> + 'static,
{
    coroutine::spawn(async move {
        loop {
            if let Err(err) = factory().await {
                return Err::<(), _>(err);
            }
        }
    })
}
