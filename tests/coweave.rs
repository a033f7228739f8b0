use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use coweave::combinator::{all, first, OneOf2};
use coweave::runtime::Scheduler;
use coweave::sync::Latch;
use coweave::{coroutine, Exception, Failure, Wait, WaitPromise};
use googletest::prelude::*;
use ignore_result::Ignore;
use pretty_assertions::assert_eq;
use scopeguard::ScopeGuard;
use test_case::test_case;

enum Pending {
    Int(WaitPromise<i32>),
    Double(WaitPromise<f64>),
}

/// Promises in creation order, delivered one per tick.
#[derive(Clone, Default)]
struct Feed {
    pending: Rc<RefCell<VecDeque<Pending>>>,
}

impl Feed {
    fn deliver(&self) {
        let front = self.pending.borrow_mut().pop_front();
        match front {
            Some(Pending::Int(promise)) => promise.set_value(1),
            Some(Pending::Double(promise)) => promise.set_value(2.2),
            None => {},
        }
    }

    fn int(&self) -> Wait<i32> {
        let promise = WaitPromise::new();
        let wait = promise.wait();
        self.pending.borrow_mut().push_back(Pending::Int(promise));
        wait
    }

    fn double(&self) -> Wait<f64> {
        let promise = WaitPromise::new();
        let wait = promise.wait();
        self.pending.borrow_mut().push_back(Pending::Double(promise));
        wait
    }

    fn sum(&self) -> Wait<i32> {
        let feed = self.clone();
        coroutine::spawn(async move { Ok::<_, Exception>(feed.int().await? + feed.int().await? + feed.int().await?) })
    }

    fn string(&self) -> Wait<String> {
        let feed = self.clone();
        coroutine::spawn(async move {
            let n = feed.sum().await?;
            let mut d = feed.double().await?;
            let m = feed.sum().await?;
            for _ in 0..m {
                d += feed.double().await?;
            }
            let (left, right) = (feed.sum(), feed.sum());
            let sum = left.await? + right.await?;
            let product = coroutine::spawn({
                let feed = feed.clone();
                async move { Ok::<_, Exception>(feed.sum().await? * feed.double().await? as i32) }
            });
            let z = product.await? + sum;
            Ok::<_, Exception>(format!("{}-{}-{:.6}", n, z, d))
        })
    }
}

#[test]
fn nested_coroutines_one_promise_per_tick() {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    let feed = Feed::default();
    let wait = feed.string();
    let mut ticks = 0;
    while !wait.ready() {
        ticks += 1;
        feed.deliver();
        scheduler.run_to_quiescence();
    }
    assert_eq!(*wait.get(), "3-12-8.800000");
    assert_eq!(ticks, 20);
}

/// Shared promises and an execution log for the cancellation chain `outer -> middle -> leaves`.
#[derive(Clone, Default)]
struct Chain {
    log: Rc<RefCell<Vec<String>>>,
    suffix: WaitPromise<String>,
    first: WaitPromise<i32>,
    second: WaitPromise<i32>,
}

impl Chain {
    fn enter(&self, name: &'static str) -> ScopeGuard<(), impl FnOnce(())> {
        self.log.borrow_mut().push(format!("run: {}", name));
        let log = self.log.clone();
        scopeguard::guard((), move |_| log.borrow_mut().push(format!("~~~: {}", name)))
    }

    fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    fn leaf<T: 'static>(&self, name: &'static str, promise: &WaitPromise<T>) -> Wait<T> {
        let _guard = self.enter(name);
        promise.wait()
    }

    fn middle(&self) -> Wait<String> {
        let chain = self.clone();
        coroutine::spawn(async move {
            let n;
            {
                let _guard = chain.enter("middle-1");
                n = chain.leaf("first", &chain.first).await?;
            }
            let _guard1 = chain.enter("middle-2");
            let res = (n + chain.leaf("second", &chain.second).await?).to_string();
            let _guard2 = chain.enter("middle-3");
            Ok::<_, Exception>(res)
        })
    }

    fn outer(&self) -> Wait<String> {
        let chain = self.clone();
        coroutine::spawn(async move {
            let _guard1 = chain.enter("outer-1");
            let mut s = chain.middle().await?;
            let _guard2 = chain.enter("outer-2");
            s += &chain.leaf("suffix", &chain.suffix).await?;
            let _guard3 = chain.enter("outer-3");
            Ok::<_, Exception>(s + ".")
        })
    }

    /// Fulfills first `n` promises in order, draining after each except possibly the last.
    fn settle(&self, scheduler: &Scheduler, n: usize, drain_last: bool) {
        for i in 0..n {
            match i {
                0 => self.first.set_value(5),
                1 => self.second.set_value(7),
                _ => self.suffix.set_value("!".to_string()),
            }
            assert_eq!(scheduler.count(), 1);
            if i + 1 < n || drain_last {
                scheduler.run_to_quiescence();
                assert_eq!(scheduler.count(), 0);
            }
        }
    }
}

const FIRST_PENDING: &[&str] = &["run: outer-1", "run: middle-1", "run: first", "~~~: first"];

const SECOND_PENDING: &[&str] = &[
    "run: outer-1",
    "run: middle-1",
    "run: first",
    "~~~: first",
    "~~~: middle-1",
    "run: middle-2",
    "run: second",
    "~~~: second",
];

const SUFFIX_PENDING: &[&str] = &[
    "run: outer-1",
    "run: middle-1",
    "run: first",
    "~~~: first",
    "~~~: middle-1",
    "run: middle-2",
    "run: second",
    "~~~: second",
    "run: middle-3",
    "~~~: middle-3",
    "~~~: middle-2",
    "run: outer-2",
    "run: suffix",
    "~~~: suffix",
];

#[test]
fn chain_completes() {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    let chain = Chain::default();
    let mut wait = chain.outer();
    assert!(!wait.ready());
    assert_eq!(scheduler.count(), 0);
    chain.settle(&scheduler, 3, true);
    assert!(wait.ready());

    wait.cancel();
    assert_eq!(scheduler.count(), 0);
    assert!(wait.ready());
    assert_eq!(*wait.get(), "12!.");

    let mut expected = SUFFIX_PENDING.to_vec();
    expected.extend(["run: outer-3", "~~~: outer-3", "~~~: outer-2", "~~~: outer-1"]);
    assert_eq!(chain.log(), expected);
}

#[test_case(0, true, FIRST_PENDING, &["~~~: middle-1", "~~~: outer-1"]; "first pending")]
#[test_case(1, false, FIRST_PENDING, &["~~~: middle-1", "~~~: outer-1"]; "first scheduled")]
#[test_case(1, true, SECOND_PENDING, &["~~~: middle-2", "~~~: outer-1"]; "second pending")]
#[test_case(2, false, SECOND_PENDING, &["~~~: middle-2", "~~~: outer-1"]; "second scheduled")]
#[test_case(2, true, SUFFIX_PENDING, &["~~~: outer-2", "~~~: outer-1"]; "suffix pending")]
#[test_case(3, false, SUFFIX_PENDING, &["~~~: outer-2", "~~~: outer-1"]; "suffix scheduled")]
fn chain_cancel(settled: usize, drain_last: bool, before: &[&str], unwound: &[&str]) {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    let chain = Chain::default();
    let mut wait = chain.outer();
    chain.settle(&scheduler, settled, drain_last);
    assert!(!wait.ready());
    assert_eq!(chain.log(), before);

    wait.cancel();
    assert_eq!(scheduler.count(), 0);
    assert!(!wait.ready());
    let mut expected = before.to_vec();
    expected.extend_from_slice(unwound);
    assert_eq!(chain.log(), expected);
}

#[test_case(1, true, SECOND_PENDING, &["~~~: middle-2", "~~~: outer-1"]; "second pending")]
#[test_case(2, true, SUFFIX_PENDING, &["~~~: outer-2", "~~~: outer-1"]; "suffix pending")]
fn chain_cancel_by_drop(settled: usize, drain_last: bool, before: &[&str], unwound: &[&str]) {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    let chain = Chain::default();
    {
        let wait = chain.outer();
        chain.settle(&scheduler, settled, drain_last);
        assert_eq!(chain.log(), before);
        assert!(!wait.ready());
    }
    assert_eq!(scheduler.count(), 0);
    let mut expected = before.to_vec();
    expected.extend_from_slice(unwound);
    assert_eq!(chain.log(), expected);

    // Promises outlive the cancelled chain and can still be fulfilled.
    chain.suffix.set_value_if_not_set("?".to_string()).ignore();
    assert_eq!(scheduler.run_to_quiescence(), 0);
    assert_eq!(chain.log(), expected);
}

#[test]
fn promise_exception_not_ready_as_value() {
    let promise = WaitPromise::<()>::new();
    let wait = promise.wait();
    assert!(!wait.has_value());
    promise.set_exception(Failure::new("test"));
    assert!(!wait.has_value());
    assert!(wait.has_exception());
}

fn throws_from_plain_fn() -> Wait<()> {
    Wait::failed(Failure::new("eager exception"))
}

fn throws_from_coroutine() -> Wait<()> {
    coroutine::spawn(async { Err::<(), _>(Exception::from(Failure::new("eager exception"))) })
}

#[test]
fn eager_exception_propagates_through_await() {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    for source in [throws_from_plain_fn as fn() -> Wait<()>, throws_from_coroutine] {
        let wait = coroutine::spawn(async move { source().await });
        assert!(wait.has_exception());
        assert!(!wait.has_value());
        let err = wait.exception().unwrap();
        assert_that!(err.downcast_ref::<Failure>().map(Failure::as_str), some(eq("eager exception")));
    }
}

/// Records entry and exit of nested coroutine scopes as letters, lower case on entry.
#[derive(Clone, Default)]
struct Places {
    places: Rc<RefCell<String>>,
    p0: Rc<RefCell<WaitPromise<()>>>,
    p1: WaitPromise<()>,
    p2: WaitPromise<()>,
}

impl Places {
    fn enter(&self, c: char) -> ScopeGuard<(), impl FnOnce(())> {
        self.places.borrow_mut().push(c);
        let places = self.places.clone();
        let upper = c.to_ascii_uppercase();
        scopeguard::guard((), move |_| places.borrow_mut().push(upper))
    }

    fn get(&self) -> String {
        self.places.borrow().clone()
    }

    fn p0(&self) -> WaitPromise<()> {
        self.p0.borrow().clone()
    }

    fn fail_early(&self) -> Wait<()> {
        let places = self.clone();
        coroutine::spawn(async move {
            let _c = places.enter('c');
            Err::<(), _>(Exception::from(Failure::new("test")))
        })
    }

    fn two_levels(&self) -> Wait<()> {
        let places = self.clone();
        coroutine::spawn(async move {
            let _a = places.enter('a');
            let wait = places.fail_early();
            assert!(wait.has_exception());
            wait.await?;
            let _b = places.enter('b');
            Ok::<_, Exception>(())
        })
    }

    fn fail_after_p0(&self) -> Wait<()> {
        let places = self.clone();
        coroutine::spawn(async move {
            let _a = places.enter('a');
            places.p0().wait().await?;
            let _b = places.enter('b');
            Err::<(), _>(Exception::from(Failure::new("test")))
        })
    }

    fn level_0(&self) -> Wait<()> {
        self.p0.borrow_mut().reset();
        let places = self.clone();
        coroutine::spawn(async move {
            let _l = places.enter('l');
            places.p0().wait().await?;
            let _m = places.enter('m');
            Ok::<_, Exception>(())
        })
    }

    fn level_2(&self) -> Wait<()> {
        let places = self.clone();
        coroutine::spawn(async move {
            let _h = places.enter('h');
            places.p1.wait().await?;
            let _i = places.enter('i');
            Err::<(), _>(Exception::from(Failure::new("test")))
        })
    }

    fn level_1(&self) -> Wait<()> {
        let places = self.clone();
        coroutine::spawn(async move {
            let _e = places.enter('e');
            places.level_0().await?;
            let _f = places.enter('f');
            places.level_2().await?;
            let _g = places.enter('g');
            Ok::<_, Exception>(())
        })
    }

    fn complex(&self) -> Wait<()> {
        let places = self.clone();
        coroutine::spawn(async move {
            let _a = places.enter('a');
            places.level_0().await?;
            let _b = places.enter('b');
            places.level_1().await?;
            let _c = places.enter('c');
            places.level_0().await?;
            let _d = places.enter('d');
            Ok::<_, Exception>(())
        })
    }

    /// Drives [Places::complex] until it waits on `p1`.
    fn complex_to_p1(&self, scheduler: &Scheduler) -> Wait<()> {
        let wait = self.complex();
        assert_eq!(self.get(), "al");
        self.p0().finish();
        scheduler.run_to_quiescence();
        assert_eq!(self.get(), "almMLbel");
        self.p0().finish();
        scheduler.run_to_quiescence();
        assert_eq!(self.get(), "almMLbelmMLfh");
        assert!(!wait.ready());
        wait
    }
}

#[test]
fn exception_two_levels_eager() {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    let places = Places::default();
    let wait = places.two_levels();
    assert_eq!(places.get(), "acCA");
    assert!(!wait.has_value());
    assert!(wait.has_exception());
}

#[test]
fn exception_simple_forward_cancel() {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    let places = Places::default();
    let mut wait = places.fail_after_p0();
    assert_eq!(places.get(), "a");
    assert!(!wait.ready());

    wait.cancel();
    assert_eq!(places.get(), "aA");
    assert!(!wait.ready());
    assert!(!wait.has_exception());
}

#[test]
fn exception_simple_backward_unwind() {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    let places = Places::default();
    let wait = places.fail_after_p0();
    places.p0().finish();
    scheduler.run_to_quiescence();
    assert_eq!(places.get(), "abBA");
    assert!(!wait.has_value());
    assert!(wait.has_exception());
}

#[test]
fn exception_complex_cancel_then_fail() {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    let places = Places::default();
    let mut wait = places.complex_to_p1(&scheduler);

    wait.cancel();
    assert_eq!(places.get(), "almMLbelmMLfhHFEBA");
    scheduler.run_to_quiescence();
    assert_eq!(places.get(), "almMLbelmMLfhHFEBA");

    for _ in 0..2 {
        places.p0().set_exception(Failure::new("test-failed"));
        places.p1.set_exception(Failure::new("test-failed"));
        places.p2.set_exception(Failure::new("test-failed"));
        scheduler.run_to_quiescence();
        assert_eq!(places.get(), "almMLbelmMLfhHFEBA");
        assert!(!wait.ready());
        assert!(!wait.has_exception());
    }
}

#[test]
fn exception_complex_fail_then_cancel() {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    let places = Places::default();
    let mut wait = places.complex_to_p1(&scheduler);

    places.p1.finish();
    scheduler.run_to_quiescence();
    assert_eq!(places.get(), "almMLbelmMLfhiIHFEBA");
    assert!(!wait.has_value());
    assert!(wait.has_exception());

    // Resolved waits keep their exception across cancel.
    wait.cancel();
    assert!(wait.has_exception());
    assert_eq!(places.get(), "almMLbelmMLfhiIHFEBA");
}

#[test]
fn exception_complex_via_promise() {
    let scheduler = Scheduler::new();
    let _scope = scheduler.enter();
    let places = Places::default();
    let wait = places.complex_to_p1(&scheduler);

    places.p1.set_exception(Failure::new("test-failed"));
    scheduler.run_to_quiescence();
    assert_eq!(places.get(), "almMLbelmMLfhHFEBA");
    assert!(wait.has_exception());
    assert_that!(wait.exception().map(|err| err.to_string()), some(eq("test-failed")));

    scheduler.run_to_quiescence();
    assert_eq!(places.get(), "almMLbelmMLfhHFEBA");
    assert!(wait.has_exception());
}

#[coweave::test]
fn race_against_latch() {
    let latch = Latch::new(2);
    let input = WaitPromise::<i32>::new();
    let waiters = (latch.wait(), latch.wait());
    let both = all(waiters);
    let raced = first((input.wait(), both));

    latch.count_down(2);
    coweave::runtime::run_to_quiescence();
    assert_eq!(*raced.get(), OneOf2::B(()));
    assert!(!input.is_resolved());
}
