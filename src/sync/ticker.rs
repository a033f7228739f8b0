use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use ignore_result::Ignore;

use crate::wait::{Wait, WaitPromise};

/// Releases current waiters on every tick.
///
/// Waits made after a tick wait for the next one.
#[derive(Clone, Default)]
pub struct Ticker {
    waiters: Rc<RefCell<Vec<WaitPromise<()>>>>,
}

impl Ticker {
    pub fn new() -> Ticker {
        Ticker::default()
    }

    pub fn tick(&self) {
        let waiters = mem::take(&mut *self.waiters.borrow_mut());
        for waiter in waiters {
            waiter.set_value_if_not_set(()).ignore();
        }
    }

    pub fn wait(&self) -> Wait<()> {
        let promise = WaitPromise::new();
        let wait = promise.wait();
        let mut waiters = self.waiters.borrow_mut();
        waiters.retain(|waiter| waiter.is_observed());
        waiters.push(promise);
        wait
    }
}
