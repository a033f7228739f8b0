//! Coroutines whose results are observed through [Wait]s.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Waker};

use log::trace;

use crate::error::Exception;
use crate::runtime::Core;
use crate::wait::{Wait, WaitPromise};

static FRAME_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static COROUTINE: RefCell<Option<Rc<Frame>>> = const { RefCell::new(None) };
}

pub(crate) fn try_current() -> Option<Rc<Frame>> {
    COROUTINE.with(|cell| cell.borrow().clone())
}

/// Returns true if called from inside a running coroutine.
pub fn is_running() -> bool {
    COROUTINE.with(|cell| cell.borrow().is_some())
}

struct Scope {
    id: u64,
    previous: Option<Rc<Frame>>,
}

impl Scope {
    fn enter(frame: &Rc<Frame>) -> Scope {
        let previous = COROUTINE.with(|cell| cell.replace(Some(frame.clone())));
        Scope { id: frame.id, previous }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let frame = COROUTINE.with(|cell| cell.replace(self.previous.take())).expect("no running coroutine");
        assert!(frame.id == self.id, "running coroutine changed");
    }
}

type Body = Pin<Box<dyn Future<Output = ()>>>;

/// Suspended or running coroutine body.
///
/// Frame is owned by the shared state of the [Wait] it resolves, scheduler only refers to it
/// weakly. Dropping frame destroys its body, and with it everything the body owns.
pub(crate) struct Frame {
    id: u64,
    core: Rc<Core>,
    queued: Cell<bool>,
    body: RefCell<Option<Body>>,
}

impl Frame {
    fn new(core: Rc<Core>, body: Body) -> Rc<Frame> {
        let id = FRAME_ID.fetch_add(1, Ordering::Relaxed);
        trace!("coroutine {} created", id);
        Rc::new(Frame { id, core, queued: Cell::new(false), body: RefCell::new(Some(body)) })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Marks frame as queued. Returns whether it was queued before.
    pub fn mark_queued(&self) -> bool {
        self.queued.replace(true)
    }

    pub fn unmark_queued(&self) {
        self.queued.set(false);
    }

    /// Queues frame on its scheduler if it is still alive.
    pub fn wake(frame: &Weak<Frame>) {
        if let Some(frame) = frame.upgrade() {
            frame.core.enqueue(&frame);
        }
    }

    /// Runs body until its next suspension point.
    pub fn resume(self: &Rc<Self>) {
        let _scope = Scope::enter(self);
        let Ok(mut body) = self.body.try_borrow_mut() else {
            return;
        };
        let Some(future) = body.as_mut() else {
            return;
        };
        let mut cx = Context::from_waker(Waker::noop());
        if future.as_mut().poll(&mut cx).is_pending() {
            return;
        }
        let completed = body.take();
        drop(body);
        drop(completed);
        trace!("coroutine {} completed", self.id);
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if self.queued.get() {
            self.core.remove_if_queued(self.id);
        }
        trace!("coroutine {} destroyed", self.id);
    }
}

/// Spawns a coroutine on current scheduler and returns a [Wait] for its result.
///
/// Body runs immediately until its first suspension point, so the returned wait could be ready
/// already. `Ok` resolves the wait with value, `Err` fails it with exception. Dropping the wait
/// before it is ready cancels the coroutine: its body is destroyed at the suspension point and
/// it is never resumed.
///
/// Inside a coroutine, the new coroutine lands on the scheduler of running coroutine. Outside,
/// it lands on scheduler entered by [crate::runtime::Scheduler::enter].
///
/// Body is polled with a no-op waker and resumed only when a [Wait] it awaits resolves.
/// Awaiting other futures that rely on their waker to be polled again hangs the coroutine
/// forever. Bridge such sources through a [WaitPromise] instead.
///
/// # Panics
/// Panic if there is no running coroutine nor entered scheduler.
pub fn spawn<F, T>(body: F) -> Wait<T>
where
    F: Future<Output = Result<T, Exception>> + 'static,
    T: 'static,
{
    let core = match try_current() {
        Some(frame) => frame.core.clone(),
        None => Core::try_current().expect("no scheduler"),
    };
    spawn_on(&core, body)
}

pub(crate) fn spawn_on<F, T>(core: &Rc<Core>, body: F) -> Wait<T>
where
    F: Future<Output = Result<T, Exception>> + 'static,
    T: 'static,
{
    let promise = WaitPromise::new();
    let wait = promise.wait();
    let frame = Frame::new(
        core.clone(),
        Box::pin(async move {
            let result = body.await;
            promise.set_result(result);
        }),
    );
    wait.own(frame.clone());
    frame.resume();
    wait
}
