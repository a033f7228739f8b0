use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::mem;
use std::rc::Rc;

use log::debug;

use crate::coroutine::Frame;
use crate::error::Exception;

pub(crate) type CallbackKey = u64;

type ValueCallback<T> = Box<dyn FnOnce(&T)>;
type ExceptionCallback = Box<dyn FnOnce(&Exception)>;

enum Slot<T> {
    Empty,
    Value(T),
    Failed(Exception),
    Consumed,
}

/// Observable status of a shared state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    /// Neither value nor exception is set.
    Waiting,
    /// Value is set and not yet taken.
    Ready,
    /// Exception is set.
    Failed,
    /// Value was taken by awaiting.
    Consumed,
}

/// State shared between [super::Wait] and its [super::WaitPromise]s.
pub(crate) struct SharedState<T: 'static> {
    slot: RefCell<Slot<T>>,
    next_key: Cell<CallbackKey>,
    value_callbacks: RefCell<Vec<(CallbackKey, ValueCallback<T>)>>,
    exception_callbacks: RefCell<Vec<(CallbackKey, ExceptionCallback)>>,
    coroutine: RefCell<Option<Rc<Frame>>>,
    attachments: RefCell<Vec<Box<dyn Any>>>,
}

fn split_off<C>(callbacks: &RefCell<Vec<(CallbackKey, C)>>, keys: &[CallbackKey]) -> Vec<(CallbackKey, C)> {
    let mut callbacks = callbacks.borrow_mut();
    let (removed, kept): (Vec<_>, Vec<_>) =
        mem::take(&mut *callbacks).into_iter().partition(|(key, _)| keys.contains(key));
    *callbacks = kept;
    removed
}

impl<T: 'static> SharedState<T> {
    pub fn new() -> Rc<SharedState<T>> {
        Rc::new(SharedState {
            slot: RefCell::new(Slot::Empty),
            next_key: Cell::new(1),
            value_callbacks: RefCell::new(Vec::new()),
            exception_callbacks: RefCell::new(Vec::new()),
            coroutine: RefCell::new(None),
            attachments: RefCell::new(Vec::new()),
        })
    }

    pub fn status(&self) -> Status {
        match &*self.slot.borrow() {
            Slot::Empty => Status::Waiting,
            Slot::Value(_) => Status::Ready,
            Slot::Failed(_) => Status::Failed,
            Slot::Consumed => Status::Consumed,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(&*self.slot.borrow(), Slot::Empty)
    }

    pub fn exception(&self) -> Option<Exception> {
        match &*self.slot.borrow() {
            Slot::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    pub fn get(&self) -> Ref<'_, T> {
        Ref::map(self.slot.borrow(), |slot| match slot {
            Slot::Value(value) => value,
            Slot::Empty => panic!("wait: value not ready"),
            Slot::Failed(_) => panic!("wait: value not set due to exception"),
            Slot::Consumed => panic!("wait: value already consumed"),
        })
    }

    /// Takes value out or clones exception. Returns `None` if still waiting.
    pub fn take_result(&self) -> Option<Result<T, Exception>> {
        let mut slot = self.slot.borrow_mut();
        match mem::replace(&mut *slot, Slot::Consumed) {
            Slot::Value(value) => Some(Ok(value)),
            Slot::Empty => {
                *slot = Slot::Empty;
                None
            },
            Slot::Failed(err) => {
                *slot = Slot::Failed(err.clone());
                Some(Err(err))
            },
            Slot::Consumed => panic!("wait: value already consumed"),
        }
    }

    fn next_key(&self) -> CallbackKey {
        let key = self.next_key.get();
        self.next_key.set(key + 1);
        key
    }

    pub fn set_value(&self, value: T) {
        {
            let mut slot = self.slot.borrow_mut();
            match &*slot {
                Slot::Empty => *slot = Slot::Value(value),
                _ => panic!("wait_promise: value or exception already set"),
            }
        }
        let discarded = mem::take(&mut *self.exception_callbacks.borrow_mut());
        drop(discarded);
        let callbacks = mem::take(&mut *self.value_callbacks.borrow_mut());
        let slot = self.slot.borrow();
        if let Slot::Value(value) = &*slot {
            for (_, callback) in callbacks {
                callback(value);
            }
        }
    }

    /// Sets exception if nothing is set. Returns whether it is set.
    pub fn set_exception(&self, err: Exception) -> bool {
        {
            let mut slot = self.slot.borrow_mut();
            if !matches!(&*slot, Slot::Empty) {
                return false;
            }
            *slot = Slot::Failed(err.clone());
        }
        let discarded = mem::take(&mut *self.value_callbacks.borrow_mut());
        drop(discarded);
        let callbacks = mem::take(&mut *self.exception_callbacks.borrow_mut());
        for (_, callback) in callbacks {
            callback(&err);
        }
        true
    }

    /// Registers callback for value. It is invoked immediately if value is present.
    ///
    /// Returns key for later removal if callback is registered.
    pub fn add_value_callback(&self, callback: ValueCallback<T>) -> Option<CallbackKey> {
        let slot = self.slot.borrow();
        match &*slot {
            Slot::Empty => {
                let key = self.next_key();
                self.value_callbacks.borrow_mut().push((key, callback));
                Some(key)
            },
            Slot::Value(value) => {
                callback(value);
                None
            },
            Slot::Failed(_) => None,
            Slot::Consumed => panic!("wait: value already consumed"),
        }
    }

    /// Registers callback for exception. It is invoked immediately if exception is present.
    pub fn add_exception_callback(&self, callback: ExceptionCallback) -> Option<CallbackKey> {
        let err = match &*self.slot.borrow() {
            Slot::Failed(err) => err.clone(),
            Slot::Empty => {
                let key = self.next_key();
                self.exception_callbacks.borrow_mut().push((key, callback));
                return Some(key);
            },
            Slot::Value(_) | Slot::Consumed => return None,
        };
        callback(&err);
        None
    }

    pub fn remove_callbacks(&self, keys: &[CallbackKey]) {
        if keys.is_empty() {
            return;
        }
        let values = split_off(&self.value_callbacks, keys);
        let exceptions = split_off(&self.exception_callbacks, keys);
        drop(values);
        drop(exceptions);
    }

    pub fn set_coroutine(&self, frame: Rc<Frame>) {
        let mut coroutine = self.coroutine.borrow_mut();
        assert!(coroutine.is_none(), "wait: coroutine already bound");
        *coroutine = Some(frame);
    }

    pub fn attach(&self, attachment: Box<dyn Any>) {
        self.attachments.borrow_mut().push(attachment);
    }

    /// Drops attachments now, whether resolved or not.
    pub fn release_attachments(&self) {
        let attachments = mem::take(&mut *self.attachments.borrow_mut());
        drop(attachments);
    }

    /// Removes callbacks of cancelled wait. Destroys bound coroutine and attachments if nothing
    /// is set yet.
    pub fn cancel(&self, keys: &[CallbackKey]) {
        self.remove_callbacks(keys);
        if self.is_resolved() {
            return;
        }
        let coroutine = self.coroutine.borrow_mut().take();
        let attachments = mem::take(&mut *self.attachments.borrow_mut());
        if let Some(frame) = &coroutine {
            debug!("coroutine {} cancelled", frame.id());
        }
        drop(coroutine);
        drop(attachments);
    }
}
