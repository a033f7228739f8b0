use std::cell::RefCell;

use super::Next;
use crate::wait::{empty_wait, Wait};

/// Endless sequence of waits, each made fresh by a factory.
pub struct Repeater<F> {
    factory: RefCell<F>,
}

impl<F> Repeater<F> {
    pub fn new(factory: F) -> Self {
        Repeater { factory: RefCell::new(factory) }
    }
}

impl<F, T> Next for Repeater<F>
where
    F: FnMut() -> Wait<T>,
    T: 'static,
{
    type Item = T;

    fn next(&self) -> Wait<T> {
        let mut factory = self.factory.borrow_mut();
        factory()
    }
}

/// One-shot wait in the shape of a sequence. See [make_streamable].
pub struct Streamable<T: 'static> {
    wait: RefCell<Option<Wait<T>>>,
}

/// Adapts `wait` into a sequence: first [Next::next] yields it, later ones never resolve.
pub fn make_streamable<T: 'static>(wait: Wait<T>) -> Streamable<T> {
    Streamable { wait: RefCell::new(Some(wait)) }
}

impl<T: 'static> Next for Streamable<T> {
    type Item = T;

    fn next(&self) -> Wait<T> {
        self.wait.borrow_mut().take().unwrap_or_else(empty_wait)
    }
}
