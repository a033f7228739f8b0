//! Cancellable waits and the promises that resolve them.

mod link;
mod state;

use std::any::Any;
use std::cell::Ref;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use derive_where::derive_where;
use static_assertions::assert_not_impl_any;

pub(crate) use self::link::disjunctive;
use self::state::{CallbackKey, SharedState};
pub use self::state::Status;
use crate::coroutine::{self, Frame};
use crate::error::Exception;

enum Waiter {
    Coroutine(u64),
    Waker(Waker),
}

impl Waiter {
    fn current(cx: &Context<'_>) -> (Waiter, Option<Rc<Frame>>) {
        match coroutine::try_current() {
            Some(frame) => (Waiter::Coroutine(frame.id()), Some(frame)),
            None => (Waiter::Waker(cx.waker().clone()), None),
        }
    }

    fn is(&self, other: &Waiter) -> bool {
        match (self, other) {
            (Waiter::Coroutine(a), Waiter::Coroutine(b)) => a == b,
            (Waiter::Waker(a), Waiter::Waker(b)) => a.will_wake(b),
            _ => false,
        }
    }
}

/// Move-only handle to an eventual value or [Exception].
///
/// A wait is the sole observer of its result. Awaiting it inside a coroutine suspends the
/// coroutine until the result is set, then takes the value out. Dropping a wait before its
/// result is set cancels it: callbacks registered through it are removed, and the coroutine
/// bound to it, if any, is destroyed without resuming.
#[must_use = "dropping a wait cancels it"]
pub struct Wait<T: 'static> {
    state: Rc<SharedState<T>>,
    keys: Vec<CallbackKey>,
    waiter: Option<(Waiter, Vec<CallbackKey>)>,
}

assert_not_impl_any!(Wait<()>: Send, Sync, Clone);

impl<T: 'static> Wait<T> {
    fn new(state: Rc<SharedState<T>>) -> Self {
        Wait { state, keys: Vec::new(), waiter: None }
    }

    /// Constructs a ready wait holding given value.
    pub fn from_value(value: T) -> Self {
        let promise = WaitPromise::new();
        promise.set_value(value);
        promise.wait()
    }

    /// Constructs a failed wait.
    pub fn failed(err: impl Into<Exception>) -> Self {
        let promise = WaitPromise::new();
        promise.set_exception(err);
        promise.wait()
    }

    /// Returns true if value or exception is set.
    pub fn ready(&self) -> bool {
        self.state.is_resolved()
    }

    /// Returns true if value is set and not yet taken.
    pub fn has_value(&self) -> bool {
        self.state.status() == Status::Ready
    }

    pub fn has_exception(&self) -> bool {
        self.state.status() == Status::Failed
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    /// Returns exception if this wait failed.
    pub fn exception(&self) -> Option<Exception> {
        self.state.exception()
    }

    /// Borrows value.
    ///
    /// # Panics
    /// Panic if value is not set, or already taken by awaiting.
    pub fn get(&self) -> Ref<'_, T> {
        self.state.get()
    }

    /// Cancels this wait in place. See [Wait] for what cancellation does.
    ///
    /// It is a no-op on ready wait, its value or exception stays observable.
    pub fn cancel(&mut self) {
        let mut keys = std::mem::take(&mut self.keys);
        if let Some((_, waiter_keys)) = self.waiter.take() {
            keys.extend(waiter_keys);
        }
        self.state.cancel(&keys);
    }

    /// Transforms value once it is ready. Exception propagates unchanged.
    pub fn map<U, F>(self, f: F) -> Wait<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        crate::combinator::fmap(f, self)
    }

    /// Registers callback for value, removed on cancellation.
    pub(crate) fn on_value(&mut self, callback: impl FnOnce(&T) + 'static) {
        if let Some(key) = self.state.add_value_callback(Box::new(callback)) {
            self.keys.push(key);
        }
    }

    /// Registers callback for exception, removed on cancellation.
    pub(crate) fn on_exception(&mut self, callback: impl FnOnce(&Exception) + 'static) {
        if let Some(key) = self.state.add_exception_callback(Box::new(callback)) {
            self.keys.push(key);
        }
    }

    /// Binds coroutine so it is destroyed on cancellation.
    pub(crate) fn own(&self, frame: Rc<Frame>) {
        self.state.set_coroutine(frame);
    }

    /// Keeps given value alive until this wait is cancelled or its state dropped.
    pub(crate) fn attach(&self, attachment: impl Any) {
        self.state.attach(Box::new(attachment));
    }

    /// Drops attachments as soon as this wait resolves, instead of when it is dropped.
    pub(crate) fn release_on_resolve(&mut self) {
        let on_value = Rc::downgrade(&self.state);
        let on_exception = on_value.clone();
        self.on_value(move |_| {
            if let Some(state) = on_value.upgrade() {
                state.release_attachments();
            }
        });
        self.on_exception(move |_| {
            if let Some(state) = on_exception.upgrade() {
                state.release_attachments();
            }
        });
    }

    /// Converts into a wait that resolves to unit when this resolves.
    pub(crate) fn discard(mut self) -> Wait<()> {
        let promise = WaitPromise::new();
        link::disjunctive(&mut self, &promise, |_| ());
        let unit = promise.wait();
        unit.attach(self);
        unit
    }

    fn watch(&mut self, cx: &Context<'_>) {
        let (waiter, frame) = Waiter::current(cx);
        if let Some((watching, _)) = &self.waiter {
            if watching.is(&waiter) {
                return;
            }
        }
        if let Some((_, keys)) = self.waiter.take() {
            self.state.remove_callbacks(&keys);
        }
        let mut keys = Vec::with_capacity(2);
        match frame {
            Some(frame) => {
                let on_value = Rc::downgrade(&frame);
                let on_exception = on_value.clone();
                keys.extend(self.state.add_value_callback(Box::new(move |_| Frame::wake(&on_value))));
                keys.extend(self.state.add_exception_callback(Box::new(move |_| Frame::wake(&on_exception))));
            },
            None => {
                let on_value = cx.waker().clone();
                let on_exception = on_value.clone();
                keys.extend(self.state.add_value_callback(Box::new(move |_| on_value.wake())));
                keys.extend(self.state.add_exception_callback(Box::new(move |_| on_exception.wake())));
            },
        }
        self.waiter = Some((waiter, keys));
    }
}

impl<T: 'static> Future for Wait<T> {
    type Output = Result<T, Exception>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let wait = self.get_mut();
        match wait.state.take_result() {
            Some(result) => Poll::Ready(result),
            None => {
                wait.watch(cx);
                Poll::Pending
            },
        }
    }
}

impl<T: 'static> Drop for Wait<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T: 'static> Default for Wait<T> {
    /// Constructs a wait that never resolves.
    fn default() -> Self {
        empty_wait()
    }
}

impl<T: 'static> fmt::Display for Wait<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            Status::Waiting => f.write_str("<waiting>"),
            Status::Ready | Status::Consumed => f.write_str("<ready>"),
            Status::Failed => f.write_str("<failed>"),
        }
    }
}

impl<T: 'static> fmt::Debug for Wait<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait").field("status", &self.status()).finish()
    }
}

/// Producer side of a [Wait].
///
/// Clones share the same state. Setting value twice is a programming error, setting exception
/// after value or exception is silently ignored.
#[derive_where(Clone)]
pub struct WaitPromise<T: 'static> {
    state: Rc<SharedState<T>>,
}

assert_not_impl_any!(WaitPromise<()>: Send, Sync);

impl<T: 'static> WaitPromise<T> {
    pub fn new() -> Self {
        WaitPromise { state: SharedState::new() }
    }

    /// Constructs a [Wait] observing this promise.
    ///
    /// A promise is designed to have one wait outstanding at a time, as awaiting takes value out.
    pub fn wait(&self) -> Wait<T> {
        Wait::new(self.state.clone())
    }

    /// Returns true if value is set.
    pub fn has_value(&self) -> bool {
        matches!(self.state.status(), Status::Ready | Status::Consumed)
    }

    /// Returns true if value or exception is set.
    pub fn is_resolved(&self) -> bool {
        self.state.is_resolved()
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    /// Sets value and fires value callbacks in registration order.
    ///
    /// # Panics
    /// Panic if value or exception is set already.
    pub fn set_value(&self, value: T) {
        self.state.set_value(value);
    }

    /// Sets value if neither value nor exception is set, otherwise gives it back.
    pub fn set_value_if_not_set(&self, value: T) -> Result<(), T> {
        if self.state.is_resolved() {
            return Err(value);
        }
        self.state.set_value(value);
        Ok(())
    }

    /// Sets exception if neither value nor exception is set. Returns whether it is set.
    pub fn set_exception(&self, err: impl Into<Exception>) -> bool {
        self.state.set_exception(err.into())
    }

    /// Sets value on `Ok` or exception on `Err`.
    pub fn set_result(&self, result: Result<T, Exception>) {
        match result {
            Ok(value) => self.set_value(value),
            Err(err) => {
                self.set_exception(err);
            },
        }
    }

    /// Returns true if any [Wait] or other clone of this promise is alive.
    pub(crate) fn is_observed(&self) -> bool {
        Rc::strong_count(&self.state) > 1
    }

    /// Detaches from current state and starts over with a fresh one.
    ///
    /// Waits constructed before stay with the old state.
    pub fn reset(&mut self) {
        self.state = SharedState::new();
    }
}

impl WaitPromise<()> {
    /// Sets unit value.
    pub fn finish(&self) {
        self.set_value(());
    }
}

impl<T: 'static> Default for WaitPromise<T> {
    fn default() -> Self {
        WaitPromise::new()
    }
}

impl<T: 'static> PartialEq for WaitPromise<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl<T: 'static> Eq for WaitPromise<T> {}

impl<T: 'static> fmt::Display for WaitPromise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            Status::Waiting => f.write_str("<empty>"),
            Status::Ready | Status::Consumed => f.write_str("<ready>"),
            Status::Failed => f.write_str("<failed>"),
        }
    }
}

impl<T: 'static> fmt::Debug for WaitPromise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitPromise").field("status", &self.status()).finish()
    }
}

/// Constructs a ready wait holding given value.
pub fn make_wait<T: 'static>(value: T) -> Wait<T> {
    Wait::from_value(value)
}

/// Constructs a wait that never resolves.
pub fn empty_wait<T: 'static>() -> Wait<T> {
    WaitPromise::new().wait()
}
