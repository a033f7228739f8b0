use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;

use ignore_result::Ignore;
use log::trace;
use static_assertions::assert_not_impl_any;

use crate::wait::{make_wait, Wait, WaitPromise};

struct Countdown {
    count: Cell<usize>,
    waiters: RefCell<Vec<WaitPromise<()>>>,
}

/// One-shot countdown barrier.
///
/// Waits are released together once counter reaches zero, waits made after that are ready
/// immediately. Counter never increases.
#[derive(Clone)]
pub struct Latch {
    countdown: Rc<Countdown>,
}

assert_not_impl_any!(Latch: Send, Sync);

impl Latch {
    pub fn new(count: usize) -> Latch {
        Latch { countdown: Rc::new(Countdown { count: Cell::new(count), waiters: RefCell::new(Vec::new()) }) }
    }

    /// Returns remaining count.
    pub fn count(&self) -> usize {
        self.countdown.count.get()
    }

    /// Decrements counter by `n`, releasing all waits if it reaches zero.
    ///
    /// # Panics
    /// Panic if `n` exceeds remaining count.
    pub fn count_down(&self, n: usize) {
        let count = self.count();
        assert!(n <= count, "latch: count down {} exceeds remaining count {}", n, count);
        self.countdown.count.set(count - n);
        if count - n != 0 {
            return;
        }
        let waiters = mem::take(&mut *self.countdown.waiters.borrow_mut());
        trace!("latch released {} waiters", waiters.len());
        for waiter in waiters {
            waiter.set_value_if_not_set(()).ignore();
        }
    }

    /// Returns true if counter reached zero.
    pub fn try_wait(&self) -> bool {
        self.count() == 0
    }

    /// Waits for counter to reach zero.
    pub fn wait(&self) -> Wait<()> {
        if self.try_wait() {
            return make_wait(());
        }
        let promise = WaitPromise::new();
        let wait = promise.wait();
        let mut waiters = self.countdown.waiters.borrow_mut();
        waiters.retain(|waiter| waiter.is_observed());
        waiters.push(promise);
        wait
    }

    /// Counts down by `n` and then waits.
    pub fn arrive_and_wait(&self, n: usize) -> Wait<()> {
        self.count_down(n);
        self.wait()
    }
}
