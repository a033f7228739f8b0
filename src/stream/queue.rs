use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::mem;
use std::rc::Rc;

use derive_where::derive_where;
use ignore_result::Ignore;
use static_assertions::assert_not_impl_any;

use super::Next;
use crate::coroutine;
use crate::error::Exception;
use crate::wait::{make_wait, Wait, WaitPromise};

struct Channel<T> {
    queue: RefCell<VecDeque<T>>,
    readers: RefCell<Vec<WaitPromise<()>>>,
}

/// Unbounded FIFO of values.
///
/// Clones share the same queue. A value is removed only when a pending [Next::next] resolves
/// with it, so cancelling a pending `next` never loses values.
#[derive_where(Clone)]
pub struct Stream<T: 'static> {
    channel: Rc<Channel<T>>,
}

assert_not_impl_any!(Stream<()>: Send, Sync);

impl<T: 'static> Stream<T> {
    pub fn new() -> Self {
        Stream { channel: Rc::new(Channel { queue: RefCell::new(VecDeque::new()), readers: RefCell::new(Vec::new()) }) }
    }

    /// Appends value and wakes readers.
    pub fn send(&self, value: T) {
        self.channel.queue.borrow_mut().push_back(value);
        let readers = mem::take(&mut *self.channel.readers.borrow_mut());
        for reader in readers {
            reader.set_value_if_not_set(()).ignore();
        }
    }

    /// Takes oldest value if any.
    pub fn try_next(&self) -> Option<T> {
        self.channel.queue.borrow_mut().pop_front()
    }

    /// Returns a wait that is ready once this stream has value buffered.
    pub fn readable(&self) -> Wait<()> {
        if !self.is_empty() {
            return make_wait(());
        }
        let promise = WaitPromise::new();
        let wait = promise.wait();
        let mut readers = self.channel.readers.borrow_mut();
        readers.retain(|reader| reader.is_observed());
        readers.push(promise);
        wait
    }

    pub fn len(&self) -> usize {
        self.channel.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.queue.borrow().is_empty()
    }

    /// Drops all buffered values.
    pub fn clear(&self) {
        let queue = mem::take(&mut *self.channel.queue.borrow_mut());
        drop(queue);
    }
}

impl<T: 'static> Default for Stream<T> {
    fn default() -> Self {
        Stream::new()
    }
}

impl<T: 'static> Next for Stream<T> {
    type Item = T;

    fn next(&self) -> Wait<T> {
        let stream = self.clone();
        coroutine::spawn(async move {
            loop {
                if let Some(value) = stream.try_next() {
                    return Ok::<_, Exception>(value);
                }
                stream.readable().await?;
            }
        })
    }
}

/// [Stream] terminated by [FiniteStream::finish].
///
/// Once the end marker is read, [Next::next] resolves to `None` repeatedly, and values sent
/// after the marker are discarded.
#[derive_where(Clone)]
pub struct FiniteStream<T: 'static> {
    stream: Stream<Option<T>>,
    ended: Rc<Cell<bool>>,
}

impl<T: 'static> FiniteStream<T> {
    pub fn new() -> Self {
        FiniteStream { stream: Stream::new(), ended: Rc::new(Cell::new(false)) }
    }

    pub fn send(&self, value: T) {
        if !self.ended.get() {
            self.stream.send(Some(value));
        }
    }

    /// Sends end marker.
    pub fn finish(&self) {
        if !self.ended.get() {
            self.stream.send(None);
        }
    }

    /// Returns true if end marker was read.
    pub fn is_ended(&self) -> bool {
        self.ended.get()
    }

    /// Starts over with no buffered values and no end marker.
    pub fn reset(&self) {
        self.stream.clear();
        self.ended.set(false);
    }
}

impl<T: 'static> Default for FiniteStream<T> {
    fn default() -> Self {
        FiniteStream::new()
    }
}

impl<T: 'static> Next for FiniteStream<T> {
    type Item = Option<T>;

    fn next(&self) -> Wait<Option<T>> {
        if self.ended.get() {
            return make_wait(None);
        }
        let stream = self.stream.clone();
        let ended = self.ended.clone();
        coroutine::spawn(async move {
            loop {
                if ended.get() {
                    return Ok::<_, Exception>(None);
                }
                match stream.try_next() {
                    Some(Some(value)) => return Ok(Some(value)),
                    Some(None) => {
                        ended.set(true);
                        stream.clear();
                        return Ok(None);
                    },
                    None => stream.readable().await?,
                }
            }
        })
    }
}
