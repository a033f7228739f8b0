//! Scheduler that queues ready coroutines and drains them to quiescence.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::mem;
use std::rc::{Rc, Weak};

use log::{debug, trace};
use static_assertions::assert_not_impl_any;

use crate::coroutine::{self, Frame};
use crate::error::Exception;
use crate::wait::Wait;

thread_local! {
    static SCHEDULER: RefCell<Option<Rc<Core>>> = const { RefCell::new(None) };
}

const DEFAULT_CAPACITY: usize = 256;

/// Guard that makes a [Scheduler] current for this thread until dropped.
///
/// Scopes nest: dropping one restores whatever scheduler was current before it.
pub struct Scope {
    core: Rc<Core>,
    previous: Option<Rc<Core>>,
}

impl Scope {
    fn enter(core: &Rc<Core>) -> Scope {
        let previous = SCHEDULER.with(|cell| cell.replace(Some(core.clone())));
        Scope { core: core.clone(), previous }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        SCHEDULER.with(|cell| {
            let core = cell.replace(self.previous.take()).expect("scheduler scope does not exist");
            assert!(Rc::ptr_eq(&core, &self.core), "current scheduler changed");
        });
    }
}

/// Builder for [Scheduler].
#[derive(Default)]
pub struct Builder {
    capacity: Option<usize>,
}

impl Builder {
    /// Specifies the initial capacity of the run queue.
    pub fn capacity(&mut self, n: usize) -> &mut Self {
        assert!(n > 0, "capacity must not be zero");
        self.capacity = Some(n);
        self
    }

    /// Constructs a [Scheduler] with no queued coroutines.
    pub fn build(&mut self) -> Scheduler {
        let capacity = self.capacity.unwrap_or(DEFAULT_CAPACITY);
        Scheduler { core: Core::new(capacity) }
    }
}

struct Queued {
    id: u64,
    frame: Weak<Frame>,
}

pub(crate) struct Core {
    runq: RefCell<VecDeque<Queued>>,
}

impl Core {
    fn new(capacity: usize) -> Rc<Core> {
        Rc::new(Core { runq: RefCell::new(VecDeque::with_capacity(capacity)) })
    }

    pub(crate) fn try_current() -> Option<Rc<Core>> {
        SCHEDULER.with(|cell| cell.borrow().clone())
    }

    /// Queues frame for resumption unless it is queued already.
    pub(crate) fn enqueue(&self, frame: &Rc<Frame>) {
        if frame.mark_queued() {
            return;
        }
        trace!("coroutine {} enqueued", frame.id());
        self.runq.borrow_mut().push_back(Queued { id: frame.id(), frame: Rc::downgrade(frame) });
    }

    /// Removes frame without resuming it. Returns whether it was queued.
    pub(crate) fn remove_if_queued(&self, id: u64) -> bool {
        let mut runq = self.runq.borrow_mut();
        match runq.iter().position(|queued| queued.id == id) {
            None => false,
            Some(position) => {
                runq.remove(position);
                trace!("coroutine {} dequeued", id);
                true
            },
        }
    }

    fn count(&self) -> usize {
        self.runq.borrow().len()
    }

    fn pop(&self) -> Option<Queued> {
        self.runq.borrow_mut().pop_front()
    }

    fn run_to_quiescence(&self) -> usize {
        assert!(coroutine::try_current().is_none(), "run_to_quiescence: called from running coroutine");
        let mut resumed = 0;
        while let Some(queued) = self.pop() {
            let Some(frame) = queued.frame.upgrade() else {
                continue;
            };
            frame.unmark_queued();
            frame.resume();
            resumed += 1;
        }
        resumed
    }

    fn clear(&self) {
        let runq = mem::take(&mut *self.runq.borrow_mut());
        for queued in runq {
            if let Some(frame) = queued.frame.upgrade() {
                frame.unmark_queued();
            }
        }
    }
}

/// Drains scheduler entered by [Scheduler::enter]. See [Scheduler::run_to_quiescence].
///
/// # Panics
/// Panic if there is no entered scheduler or if called from inside a coroutine.
pub fn run_to_quiescence() -> usize {
    let core = Core::try_current().expect("no scheduler");
    core.run_to_quiescence()
}

/// Scheduler of coroutines living on one thread.
///
/// Coroutines are queued when something they await becomes ready. The host drives them by
/// calling [Scheduler::run_to_quiescence] once per tick. Dropping the scheduler discards its
/// queue, it does not destroy coroutines: they are owned by their [Wait]s.
pub struct Scheduler {
    core: Rc<Core>,
}

assert_not_impl_any!(Scheduler: Send, Sync);
assert_not_impl_any!(Scope: Send, Sync);

impl Scheduler {
    /// Constructs a scheduler with default settings.
    pub fn new() -> Scheduler {
        Builder::default().build()
    }

    /// Makes this scheduler current for [coroutine::spawn] until returned scope dropped.
    pub fn enter(&self) -> Scope {
        Scope::enter(&self.core)
    }

    /// Spawns a coroutine on this scheduler. See [coroutine::spawn] for details.
    pub fn spawn<F, T>(&self, body: F) -> Wait<T>
    where
        F: Future<Output = Result<T, Exception>> + 'static,
        T: 'static,
    {
        coroutine::spawn_on(&self.core, body)
    }

    /// Resumes queued coroutines until none is queued, including those queued during this
    /// run. Returns the number of resumptions.
    ///
    /// # Panics
    /// Panic if called from inside a coroutine.
    pub fn run_to_quiescence(&self) -> usize {
        debug!("draining {} queued coroutines", self.count());
        let resumed = self.core.run_to_quiescence();
        debug!("drained after {} resumptions", resumed);
        resumed
    }

    /// Returns the number of queued coroutines.
    pub fn count(&self) -> usize {
        self.core.count()
    }

    /// Discards all queued coroutines without resuming them.
    pub fn clear(&self) {
        self.core.clear();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let queued = self.count();
        if queued != 0 {
            debug!("scheduler dropped with {} queued coroutines", queued);
        }
        self.clear();
    }
}
